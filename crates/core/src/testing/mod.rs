//! Testing utilities and mock implementations.
//!
//! The mocks stand in for the browser, the reference clock, and the booking
//! runner, so the engine can be exercised without a WebDriver endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use tatkal_core::testing::{fixtures, MockBookingRunner};
//!
//! let runner = Arc::new(MockBookingRunner::new());
//! runner.set_delay(Duration::from_millis(50));
//!
//! let queue = BookingQueue::new(runner.clone(), 2, 10, EventHandle::disconnected());
//! queue.enqueue(fixtures::booking_config(), 0);
//! queue.drain();
//! ```

mod mock_clock;
mod mock_runner;
mod mock_surface;

pub use mock_clock::MockClock;
pub use mock_runner::MockBookingRunner;
pub use mock_surface::{MockLauncher, MockSurface, SurfaceCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Days, Utc};

    use super::MockLauncher;
    use crate::booking::{BookingConfig, Gender, Passenger, PaymentPreferences, Quota, TravelClass};
    use crate::bot::{selectors, BotSettings};
    use crate::config::CredentialProfile;
    use crate::credentials::ConfigCredentialProvider;

    /// PNR shown by [`happy_launcher`].
    pub const PNR: &str = "4521873690";

    /// A valid booking a month from today.
    pub fn booking_config() -> BookingConfig {
        BookingConfig {
            from_station: "NDLS".to_string(),
            to_station: "BCT".to_string(),
            journey_date: Utc::now().date_naive() + Days::new(30),
            travel_class: TravelClass::ThirdAc,
            quota: Quota::Tatkal,
            passengers: vec![Passenger {
                name: "Asha Rao".to_string(),
                age: 34,
                gender: Gender::F,
                berth_preference: None,
            }],
            credentials: "primary".to_string(),
            payment: PaymentPreferences::default(),
            train_number: None,
            auto_upgrade: false,
            travel_insurance: false,
        }
    }

    pub fn passenger(name: &str, age: u8) -> Passenger {
        Passenger {
            name: name.to_string(),
            age,
            gender: Gender::M,
            berth_preference: None,
        }
    }

    /// Provider knowing the `primary` profile.
    pub fn credential_provider() -> Arc<ConfigCredentialProvider> {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "primary".to_string(),
            CredentialProfile {
                username: "asha.rao".to_string(),
                password: "s3cret".to_string(),
            },
        );
        Arc::new(ConfigCredentialProvider::new(profiles))
    }

    /// Settings with waits short enough for tests.
    pub fn bot_settings() -> BotSettings {
        BotSettings {
            base_url: "https://booking.test".to_string(),
            search_path: "/nget/train-search".to_string(),
            page_timeout: Duration::from_millis(100),
            input_timeout: Duration::from_millis(200),
            payment_timeout: Duration::from_millis(100),
            confirmation_timeout: Duration::from_millis(100),
            element_timeout: Duration::from_millis(50),
            otp_detect_timeout: Duration::from_millis(20),
            captcha_detect_timeout: Duration::from_millis(20),
        }
    }

    /// A launcher whose pages walk through a successful booking without prompts.
    pub fn happy_launcher() -> MockLauncher {
        let launcher = MockLauncher::new();
        launcher
            .present([
                selectors::LOGIN_LINK,
                selectors::USER_ID,
                selectors::LOGGED_IN,
                selectors::ORIGIN,
                selectors::DESTINATION,
                selectors::TRAIN_LIST,
                selectors::FIRST_BOOKABLE,
                selectors::PASSENGER_FORM,
                selectors::PAYMENT_OPTIONS,
                selectors::PNR_DETAILS,
            ])
            .set_text(selectors::PNR_NUMBER, PNR)
            .set_url_reached(true)
            .set_screenshot(vec![0x89, b'P', b'N', b'G']);
        launcher
    }
}
