//! Booking request model, result record, and request validation.

mod types;
mod validate;

pub use types::{
    BerthPreference, BookingConfig, BookingResult, BookingStatus, Gender, JourneySummary,
    Passenger, PaymentPreferences, Quota, TravelClass,
};
pub use validate::{
    validate_booking, validate_credentials, validate_input, validate_passengers, ValidationError,
    MAX_ADVANCE_DAYS, MAX_PASSENGERS, UPI_GATEWAYS,
};
