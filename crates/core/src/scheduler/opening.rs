//! When a quota opens for a given journey.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::booking::TravelClass;
use crate::config::{ConfigError, OpeningConfig};

const DEFAULT_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Opening instant in booking-site local time, using the standard rules:
/// the day before the journey, at 10:00 for the premium classes and 11:00
/// for everything else.
pub fn compute_opening_time(journey_date: NaiveDate, travel_class: TravelClass) -> NaiveDateTime {
    OpeningRules::default().local_opening(journey_date, travel_class)
}

/// Daily opening times and the time zone they are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningRules {
    ac_time: NaiveTime,
    non_ac_time: NaiveTime,
    utc_offset: FixedOffset,
}

impl Default for OpeningRules {
    fn default() -> Self {
        Self {
            ac_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            non_ac_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            utc_offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap(),
        }
    }
}

impl OpeningRules {
    pub fn new(ac_time: NaiveTime, non_ac_time: NaiveTime, utc_offset: FixedOffset) -> Self {
        Self {
            ac_time,
            non_ac_time,
            utc_offset,
        }
    }

    pub fn from_config(config: &OpeningConfig) -> Result<Self, ConfigError> {
        let ac_time = parse_time(&config.ac_time).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "scheduler.opening.ac_time '{}' is not HH:MM",
                config.ac_time
            ))
        })?;
        let non_ac_time = parse_time(&config.non_ac_time).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "scheduler.opening.non_ac_time '{}' is not HH:MM",
                config.non_ac_time
            ))
        })?;
        let utc_offset = parse_utc_offset(&config.utc_offset).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "scheduler.opening.utc_offset '{}' is not +HH:MM",
                config.utc_offset
            ))
        })?;
        Ok(Self::new(ac_time, non_ac_time, utc_offset))
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Opening instant in local time.
    pub fn local_opening(&self, journey_date: NaiveDate, travel_class: TravelClass) -> NaiveDateTime {
        let day_before = journey_date.pred_opt().unwrap_or(journey_date);
        let time = if travel_class.opens_early() {
            self.ac_time
        } else {
            self.non_ac_time
        };
        day_before.and_time(time)
    }

    pub fn opening_instant(&self, journey_date: NaiveDate, travel_class: TravelClass) -> DateTime<Utc> {
        let local = self.local_opening(journey_date, travel_class);
        let utc = local - chrono::Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }

    /// True from the opening instant onwards.
    pub fn is_opening_time_passed(
        &self,
        journey_date: NaiveDate,
        travel_class: TravelClass,
        now: DateTime<Utc>,
    ) -> bool {
        now >= self.opening_instant(journey_date, travel_class)
    }

    /// Zero once the opening has passed.
    pub fn time_until_opening(
        &self,
        journey_date: NaiveDate,
        travel_class: TravelClass,
        now: DateTime<Utc>,
    ) -> Duration {
        (self.opening_instant(journey_date, travel_class) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Parses `+HH:MM` / `-HH:MM`.
fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_premium_classes_open_at_ten() {
        for class in [
            TravelClass::FirstAc,
            TravelClass::SecondAc,
            TravelClass::ThirdAc,
            TravelClass::ChairCar,
            TravelClass::ExecutiveChair,
        ] {
            let opening = compute_opening_time(date(2026, 11, 20), class);
            assert_eq!(opening, date(2026, 11, 19).and_hms_opt(10, 0, 0).unwrap());
        }
    }

    #[test]
    fn test_other_classes_open_at_eleven() {
        for class in [
            TravelClass::ThirdAcEconomy,
            TravelClass::FirstClass,
            TravelClass::Sleeper,
            TravelClass::SecondSitting,
        ] {
            let opening = compute_opening_time(date(2026, 11, 20), class);
            assert_eq!(opening, date(2026, 11, 19).and_hms_opt(11, 0, 0).unwrap());
        }
    }

    #[test]
    fn test_opening_crosses_month_boundary() {
        let opening = compute_opening_time(date(2026, 12, 1), TravelClass::Sleeper);
        assert_eq!(opening, date(2026, 11, 30).and_hms_opt(11, 0, 0).unwrap());
    }

    #[test]
    fn test_opening_instant_in_utc() {
        let rules = OpeningRules::default();
        let instant = rules.opening_instant(date(2026, 11, 20), TravelClass::ThirdAc);
        // 10:00 IST is 04:30 UTC
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 11, 19, 4, 30, 0).unwrap());
    }

    #[test]
    fn test_is_opening_time_passed_boundary() {
        let rules = OpeningRules::default();
        let journey = date(2026, 11, 20);
        let opening = rules.opening_instant(journey, TravelClass::Sleeper);

        let just_before = opening - chrono::Duration::milliseconds(1);
        assert!(!rules.is_opening_time_passed(journey, TravelClass::Sleeper, just_before));
        assert!(rules.is_opening_time_passed(journey, TravelClass::Sleeper, opening));
        assert!(rules.is_opening_time_passed(
            journey,
            TravelClass::Sleeper,
            opening + chrono::Duration::seconds(1)
        ));
    }

    #[test]
    fn test_time_until_opening() {
        let rules = OpeningRules::default();
        let journey = date(2026, 11, 20);
        let opening = rules.opening_instant(journey, TravelClass::FirstAc);

        let remaining = rules.time_until_opening(
            journey,
            TravelClass::FirstAc,
            opening - chrono::Duration::minutes(90),
        );
        assert_eq!(remaining, Duration::from_secs(90 * 60));
        assert_eq!(
            rules.time_until_opening(journey, TravelClass::FirstAc, opening),
            Duration::ZERO
        );
    }

    #[test]
    fn test_from_config() {
        let config = OpeningConfig {
            ac_time: "09:45".to_string(),
            non_ac_time: "10:45".to_string(),
            utc_offset: "+00:00".to_string(),
        };
        let rules = OpeningRules::from_config(&config).unwrap();
        let instant = rules.opening_instant(date(2026, 11, 20), TravelClass::Sleeper);
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 11, 19, 10, 45, 0).unwrap());

        assert_eq!(
            OpeningRules::from_config(&OpeningConfig::default()).unwrap(),
            OpeningRules::default()
        );
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(
            parse_utc_offset("+05:30").unwrap().local_minus_utc(),
            DEFAULT_UTC_OFFSET_SECS
        );
        assert_eq!(parse_utc_offset("-03:00").unwrap().local_minus_utc(), -3 * 3600);
        assert!(parse_utc_offset("05:30").is_none());
        assert!(parse_utc_offset("+5:30").is_none());
        assert!(parse_utc_offset("+24:00").is_none());
        assert!(parse_utc_offset("").is_none());
    }
}
