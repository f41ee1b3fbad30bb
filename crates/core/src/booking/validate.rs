//! Pre-submission checks for booking requests and user-supplied input.

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

use super::types::{BookingConfig, Passenger};
use crate::credentials::Credentials;
use crate::input::InputKind;

/// Furthest a journey may be booked ahead of today.
pub const MAX_ADVANCE_DAYS: i64 = 120;

/// Maximum passengers on one booking.
pub const MAX_PASSENGERS: usize = 6;

/// Gateways offered on the UPI payment page.
pub const UPI_GATEWAYS: &[&str] = &["PAYTM", "PHONEPE", "GPAY", "BHIM", "AMAZONPAY"];

static STATION_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,5}$").unwrap());
static PASSENGER_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z .]+$").unwrap());
static TRAIN_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").unwrap());
static UPI_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.-]+@[\w-]+$").unwrap());
static OTP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").unwrap());

/// Every problem found in a request, in field order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation failed: {}", .errors.join("; "))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

/// Validate a booking request against `today` (local date at the booking site).
pub fn validate_booking(config: &BookingConfig, today: NaiveDate) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    for (label, code) in [("From", &config.from_station), ("To", &config.to_station)] {
        if !STATION_CODE.is_match(code) {
            errors.push(format!("{} station must be a 2-5 letter station code", label));
        }
    }
    if config.from_station == config.to_station {
        errors.push("From and to stations cannot be the same".to_string());
    }

    if config.journey_date <= today {
        errors.push("Journey date must be in the future".to_string());
    } else if config.journey_date > today + Duration::days(MAX_ADVANCE_DAYS) {
        errors.push(format!(
            "Journey date cannot be more than {} days from today",
            MAX_ADVANCE_DAYS
        ));
    }

    if let Some(ref train) = config.train_number {
        if !TRAIN_NUMBER.is_match(train) {
            errors.push("Invalid train number format. Must be 5 digits".to_string());
        }
    }

    if config.credentials.trim().is_empty() {
        errors.push("Credential profile is required".to_string());
    }

    errors.extend(passenger_errors(&config.passengers));

    if let Some(ref upi) = config.payment.upi_id {
        if !UPI_ID.is_match(upi.trim()) {
            errors.push("Invalid UPI ID format".to_string());
        }
    }
    if let Some(ref gateway) = config.payment.upi_gateway {
        if !UPI_GATEWAYS.contains(&gateway.as_str()) {
            errors.push("Invalid UPI gateway selection".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

/// Check a passenger list on its own, as saved for reuse.
pub fn validate_passengers(passengers: &[Passenger]) -> Result<(), ValidationError> {
    let errors = passenger_errors(passengers);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

/// Check a login pair before it is sealed.
pub fn validate_credentials(credentials: &Credentials) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    if credentials.username.trim().chars().count() < 3 {
        errors.push("Username must be at least 3 characters long".to_string());
    }
    if credentials.password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters long".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn passenger_errors(passengers: &[Passenger]) -> Vec<String> {
    let mut errors = Vec::new();

    if passengers.is_empty() {
        errors.push("At least one passenger is required".to_string());
    } else if passengers.len() > MAX_PASSENGERS {
        errors.push(format!(
            "Maximum {} passengers allowed per booking",
            MAX_PASSENGERS
        ));
    }

    for (i, passenger) in passengers.iter().enumerate() {
        let prefix = format!("Passenger {}: ", i + 1);
        let name = passenger.name.trim();
        if name.chars().count() < 2 {
            errors.push(format!("{}Name must be at least 2 characters", prefix));
        } else if name.chars().count() > 50 {
            errors.push(format!("{}Name must be less than 50 characters", prefix));
        } else if !PASSENGER_NAME.is_match(name) {
            errors.push(format!(
                "{}Name can only contain letters, spaces, and dots",
                prefix
            ));
        }
        if !(1..=120).contains(&passenger.age) {
            errors.push(format!("{}Age must be between 1 and 120", prefix));
        }
    }

    errors
}

/// Check a captcha or OTP value before handing it to a waiting run.
pub fn validate_input(kind: InputKind, value: &str) -> bool {
    match kind {
        InputKind::Captcha => {
            let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            cleaned.len() >= 4 && cleaned.chars().all(|c| c.is_ascii_alphanumeric())
        }
        InputKind::Otp => OTP.is_match(value.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{Gender, Passenger};
    use crate::testing::fixtures;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        let mut config = fixtures::booking_config();
        config.journey_date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert!(validate_booking(&config, today()).is_ok());
    }

    #[test]
    fn test_collects_every_problem() {
        let mut config = fixtures::booking_config();
        config.journey_date = today();
        config.to_station = config.from_station.clone();
        config.train_number = Some("12AB".to_string());
        config.passengers.push(Passenger {
            name: "X".to_string(),
            age: 0,
            gender: Gender::M,
            berth_preference: None,
        });

        let err = validate_booking(&config, today()).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("cannot be the same")));
        assert!(err.errors.iter().any(|e| e.contains("in the future")));
        assert!(err.errors.iter().any(|e| e.contains("5 digits")));
        assert!(err.errors.iter().any(|e| e.starts_with("Passenger 2: Name")));
        assert!(err.errors.iter().any(|e| e.starts_with("Passenger 2: Age")));
    }

    #[test]
    fn test_advance_window() {
        let mut config = fixtures::booking_config();
        config.journey_date = today() + Duration::days(MAX_ADVANCE_DAYS);
        assert!(validate_booking(&config, today()).is_ok());

        config.journey_date = today() + Duration::days(MAX_ADVANCE_DAYS + 1);
        assert!(validate_booking(&config, today()).is_err());
    }

    #[test]
    fn test_passenger_count_limits() {
        let mut config = fixtures::booking_config();
        config.journey_date = today() + Duration::days(1);
        config.passengers.clear();
        assert!(validate_booking(&config, today()).is_err());

        config.passengers = (0..7).map(|_| fixtures::passenger("Ravi Kumar", 40)).collect();
        let err = validate_booking(&config, today()).unwrap_err();
        assert!(err.errors[0].contains("Maximum 6"));
    }

    #[test]
    fn test_payment_checks() {
        let mut config = fixtures::booking_config();
        config.journey_date = today() + Duration::days(1);
        config.payment.upi_id = Some("not-an-upi".to_string());
        config.payment.upi_gateway = Some("CASH".to_string());
        let err = validate_booking(&config, today()).unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input(InputKind::Captcha, "ab 12"));
        assert!(!validate_input(InputKind::Captcha, "ab1"));
        assert!(!validate_input(InputKind::Captcha, "ab1!x"));
        assert!(validate_input(InputKind::Otp, "123456"));
        assert!(!validate_input(InputKind::Otp, "12345"));
        assert!(!validate_input(InputKind::Otp, "12345a"));
    }

    #[test]
    fn test_validate_passengers_alone() {
        assert!(validate_passengers(&[fixtures::passenger("Asha Rao", 34)]).is_ok());

        let err = validate_passengers(&[]).unwrap_err();
        assert_eq!(err.errors, vec!["At least one passenger is required"]);

        let err = validate_passengers(&[fixtures::passenger("R2-D2", 0)]).unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }

    #[test]
    fn test_validate_credentials() {
        let good = Credentials {
            username: "asha.rao".to_string(),
            password: "s3cret-pass".to_string(),
        };
        assert!(validate_credentials(&good).is_ok());

        let bad = Credentials {
            username: " ab ".to_string(),
            password: "short".to_string(),
        };
        assert_eq!(validate_credentials(&bad).unwrap_err().errors.len(), 2);
    }
}
