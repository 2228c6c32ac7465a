use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Timeline payload as returned by the weather provider. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWeatherResponse {
    #[serde(default)]
    pub current_conditions: Option<RawObservation>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub days: Vec<RawDay>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub alerts: Vec<RawAlert>,
}

impl RawWeatherResponse {
    /// True when the payload carries none of the sections the pipeline reads.
    pub fn is_empty(&self) -> bool {
        self.current_conditions.is_none() && self.days.is_empty() && self.alerts.is_empty()
    }

    /// Date string of the first day in the response, used to complete time-only timestamps.
    pub fn first_day_date(&self) -> Option<&str> {
        self.days.first().and_then(|day| day.datetime.as_deref())
    }
}

/// One reading, shared by `currentConditions` and the entries of `days[].hours`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawObservation {
    pub datetime: Option<String>,
    pub temp: Option<f64>,
    pub feelslike: Option<f64>,
    pub dew: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub windspeed: Option<f64>,
    pub windgust: Option<f64>,
    pub winddir: Option<f64>,
    pub visibility: Option<f64>,
    pub cloudcover: Option<f64>,
    pub precip: Option<f64>,
    pub precipprob: Option<f64>,
    pub uvindex: Option<f64>,
    pub severerisk: Option<f64>,
    pub conditions: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDay {
    pub datetime: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hours: Vec<RawObservation>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAlert {
    pub event: Option<String>,
    pub description: Option<String>,
    pub expires: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Row shape of `current_conditions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentConditionsRecord {
    pub datetime: Option<NaiveDateTime>,
    pub temp: Option<f64>,
    pub feelslike: Option<f64>,
    pub dew: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub windspeed: Option<f64>,
    pub windgust: Option<f64>,
    pub winddir: Option<f64>,
    pub visibility: Option<f64>,
    pub cloudcover: Option<f64>,
    pub precip: Option<f64>,
    pub precipprob: Option<f64>,
    pub uvindex: Option<f64>,
    pub severerisk: Option<f64>,
    pub conditions: Option<String>,
    pub description: Option<String>,
}

/// Row shape of `hourly_weather`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyRecord {
    pub datetime: Option<NaiveDateTime>,
    pub temp: Option<f64>,
    pub feelslike: Option<f64>,
    pub windspeed: Option<f64>,
    pub windgust: Option<f64>,
    pub winddir: Option<f64>,
    pub precip: Option<f64>,
    pub precipprob: Option<f64>,
    pub humidity: Option<f64>,
    pub visibility: Option<f64>,
    pub cloudcover: Option<f64>,
    pub pressure: Option<f64>,
}

/// Row shape of `weather_alerts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertRecord {
    pub event: Option<String>,
    pub description: Option<String>,
    pub expires: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedBundle {
    pub current_conditions: Option<CurrentConditionsRecord>,
    pub hourly: Vec<HourlyRecord>,
    pub alerts: Vec<AlertRecord>,
}

impl TransformedBundle {
    pub fn is_empty(&self) -> bool {
        self.current_conditions.is_none() && self.hourly.is_empty() && self.alerts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UnitGroup {
    #[default]
    Us,
    Metric,
}

impl UnitGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitGroup::Us => "us",
            UnitGroup::Metric => "metric",
        }
    }
}

impl fmt::Display for UnitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("a window of {days} days reaches before the earliest representable date")]
    OutOfRange { days: i64 },
}

/// Closed interval of calendar days requested from the timeline endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[today - days, today]`.
    pub fn trailing_days(days: i64) -> Result<Self, DateRangeError> {
        let end = Utc::now().date_naive();
        let start = Duration::try_days(days.max(0))
            .and_then(|window| end.checked_sub_signed(window))
            .ok_or(DateRangeError::OutOfRange { days })?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let err = DateRange::new(date(2024, 12, 17), date(2024, 12, 15)).unwrap_err();
        assert_eq!(
            err,
            DateRangeError::Inverted {
                start: date(2024, 12, 17),
                end: date(2024, 12, 15),
            }
        );
    }

    #[test]
    fn single_day_range_is_allowed() {
        let range = DateRange::new(date(2024, 12, 15), date(2024, 12, 15)).expect("valid range");
        assert_eq!(range.to_string(), "2024-12-15..2024-12-15");
    }

    #[test]
    fn trailing_days_ends_today() {
        let range = DateRange::trailing_days(7).expect("valid range");
        let today = Utc::now().date_naive();
        assert_eq!(range.end(), today);
        assert_eq!(range.start(), today - Duration::days(7));
    }

    #[test]
    fn oversized_trailing_window_is_an_error() {
        assert_eq!(
            DateRange::trailing_days(100_000_000),
            Err(DateRangeError::OutOfRange { days: 100_000_000 })
        );
        assert_eq!(
            DateRange::trailing_days(i64::MAX),
            Err(DateRangeError::OutOfRange { days: i64::MAX })
        );
    }

    #[test]
    fn raw_response_tolerates_missing_and_null_sections() {
        let raw: RawWeatherResponse =
            serde_json::from_str(r#"{"days": null, "resolvedAddress": "x"}"#).expect("parses");
        assert!(raw.current_conditions.is_none());
        assert!(raw.days.is_empty());
        assert!(raw.alerts.is_empty());
        assert!(raw.is_empty());
    }

    #[test]
    fn raw_observation_accepts_integer_numbers() {
        let raw: RawWeatherResponse = serde_json::from_str(
            r#"{"currentConditions": {"datetime": "14:30:00", "temp": 41, "uvindex": 0}}"#,
        )
        .expect("parses");
        let current = raw.current_conditions.expect("current conditions present");
        assert_eq!(current.temp, Some(41.0));
        assert_eq!(current.uvindex, Some(0.0));
        assert_eq!(current.dew, None);
    }

    #[test]
    fn unit_group_renders_query_values() {
        assert_eq!(UnitGroup::default().as_str(), "us");
        assert_eq!(UnitGroup::Metric.to_string(), "metric");
    }
}
