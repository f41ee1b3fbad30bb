//! Booking request and result types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Travel class codes as used on the reservation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelClass {
    #[serde(rename = "1A")]
    FirstAc,
    #[serde(rename = "2A")]
    SecondAc,
    #[serde(rename = "3A")]
    ThirdAc,
    #[serde(rename = "3E")]
    ThirdAcEconomy,
    #[serde(rename = "CC")]
    ChairCar,
    #[serde(rename = "EC")]
    ExecutiveChair,
    #[serde(rename = "FC")]
    FirstClass,
    #[serde(rename = "SL")]
    Sleeper,
    #[serde(rename = "2S")]
    SecondSitting,
}

impl TravelClass {
    /// Site code for this class.
    pub fn code(&self) -> &'static str {
        match self {
            TravelClass::FirstAc => "1A",
            TravelClass::SecondAc => "2A",
            TravelClass::ThirdAc => "3A",
            TravelClass::ThirdAcEconomy => "3E",
            TravelClass::ChairCar => "CC",
            TravelClass::ExecutiveChair => "EC",
            TravelClass::FirstClass => "FC",
            TravelClass::Sleeper => "SL",
            TravelClass::SecondSitting => "2S",
        }
    }

    /// Parse a site code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1A" => Some(TravelClass::FirstAc),
            "2A" => Some(TravelClass::SecondAc),
            "3A" => Some(TravelClass::ThirdAc),
            "3E" => Some(TravelClass::ThirdAcEconomy),
            "CC" => Some(TravelClass::ChairCar),
            "EC" => Some(TravelClass::ExecutiveChair),
            "FC" => Some(TravelClass::FirstClass),
            "SL" => Some(TravelClass::Sleeper),
            "2S" => Some(TravelClass::SecondSitting),
            _ => None,
        }
    }

    /// Classes whose short-notice quota opens in the earlier window.
    pub fn opens_early(&self) -> bool {
        matches!(
            self,
            TravelClass::FirstAc
                | TravelClass::SecondAc
                | TravelClass::ThirdAc
                | TravelClass::ChairCar
                | TravelClass::ExecutiveChair
        )
    }
}

impl fmt::Display for TravelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Booking quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quota {
    /// General quota.
    #[serde(rename = "GN")]
    General,
    /// Short-notice (Tatkal) quota.
    #[default]
    #[serde(rename = "TQ")]
    Tatkal,
    /// Premium short-notice quota.
    #[serde(rename = "PT")]
    PremiumTatkal,
}

impl Quota {
    pub fn code(&self) -> &'static str {
        match self {
            Quota::General => "GN",
            Quota::Tatkal => "TQ",
            Quota::PremiumTatkal => "PT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
    T,
}

impl Gender {
    pub fn code(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::T => "T",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BerthPreference {
    /// Lower berth.
    Lb,
    /// Middle berth.
    Mb,
    /// Upper berth.
    Ub,
    /// Side lower.
    Sl,
    /// Side upper.
    Su,
    /// No preference.
    None,
}

impl BerthPreference {
    pub fn code(&self) -> &'static str {
        match self {
            BerthPreference::Lb => "LB",
            BerthPreference::Mb => "MB",
            BerthPreference::Ub => "UB",
            BerthPreference::Sl => "SL",
            BerthPreference::Su => "SU",
            BerthPreference::None => "NONE",
        }
    }
}

/// A traveller on the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub berth_preference: Option<BerthPreference>,
}

/// Payment choices applied on the payment page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPreferences {
    /// Gateway option value on the UPI page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_gateway: Option<String>,
    /// UPI virtual payment address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
}

/// Immutable description of one booking attempt.
///
/// Validated before it reaches the engine and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Origin station code.
    pub from_station: String,
    /// Destination station code.
    pub to_station: String,
    pub journey_date: NaiveDate,
    pub travel_class: TravelClass,
    #[serde(default)]
    pub quota: Quota,
    pub passengers: Vec<Passenger>,
    /// Name of the credential profile used to log in.
    pub credentials: String,
    #[serde(default)]
    pub payment: PaymentPreferences,
    /// Preferred train number; first bookable train when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_number: Option<String>,
    #[serde(default)]
    pub auto_upgrade: bool,
    #[serde(default)]
    pub travel_insurance: bool,
}

impl BookingConfig {
    /// Summary echoed into the result record.
    pub fn journey_summary(&self) -> JourneySummary {
        JourneySummary {
            from_station: self.from_station.clone(),
            to_station: self.to_station.clone(),
            journey_date: self.journey_date,
            travel_class: self.travel_class,
            passenger_count: self.passengers.len(),
        }
    }
}

/// Journey details carried on results and job listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneySummary {
    pub from_station: String,
    pub to_station: String,
    pub journey_date: NaiveDate,
    pub travel_class: TravelClass,
    pub passenger_count: usize,
}

/// Terminal disposition of a booking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Success,
    Failed,
    Unknown,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Success => "success",
            BookingStatus::Failed => "failed",
            BookingStatus::Unknown => "unknown",
        }
    }
}

/// The single terminal record produced by every pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResult {
    pub run_id: String,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub journey: JourneySummary,
}

impl BookingResult {
    pub fn success(run_id: &str, config: &BookingConfig, pnr: String) -> Self {
        Self::new(run_id, config, BookingStatus::Success, Some(pnr), None)
    }

    pub fn failed(run_id: &str, config: &BookingConfig, detail: impl Into<String>) -> Self {
        Self::new(run_id, config, BookingStatus::Failed, None, Some(detail.into()))
    }

    pub fn unknown(run_id: &str, config: &BookingConfig, detail: impl Into<String>) -> Self {
        Self::new(run_id, config, BookingStatus::Unknown, None, Some(detail.into()))
    }

    fn new(
        run_id: &str,
        config: &BookingConfig,
        status: BookingStatus,
        pnr: Option<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            status,
            pnr,
            detail,
            timestamp: Utc::now(),
            journey: config.journey_summary(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BookingStatus::Success
    }
}
