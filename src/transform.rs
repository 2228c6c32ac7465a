use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

use crate::models::{
    AlertRecord, CurrentConditionsRecord, HourlyRecord, RawAlert, RawObservation,
    RawWeatherResponse, TransformedBundle,
};

/// Length of an `HH:MM:SS` value.
const TIME_ONLY_LEN: usize = 8;

// `%.f` also matches an absent fraction.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Reshapes a raw timeline payload into the three row shapes. Never fails:
/// absent source fields stay `None` in the output.
pub fn transform(raw: &RawWeatherResponse) -> TransformedBundle {
    TransformedBundle {
        current_conditions: transform_current(raw),
        hourly: hourly_records(raw).collect(),
        alerts: raw.alerts.iter().map(alert_record).collect(),
    }
}

/// Current conditions only. A time-only timestamp is completed with the first day's date.
pub fn transform_current(raw: &RawWeatherResponse) -> Option<CurrentConditionsRecord> {
    let current = raw.current_conditions.as_ref()?;
    let datetime = current
        .datetime
        .as_deref()
        .and_then(|value| resolve_timestamp(value, raw.first_day_date()));

    Some(CurrentConditionsRecord {
        datetime,
        temp: current.temp,
        feelslike: current.feelslike,
        dew: current.dew,
        humidity: current.humidity,
        pressure: current.pressure,
        windspeed: current.windspeed,
        windgust: current.windgust,
        winddir: current.winddir,
        visibility: current.visibility,
        cloudcover: current.cloudcover,
        precip: current.precip,
        precipprob: current.precipprob,
        uvindex: current.uvindex,
        severerisk: current.severerisk,
        conditions: current.conditions.clone(),
        description: current.description.clone(),
    })
}

/// Hourly rows in day-then-hour source order.
pub fn hourly_records(raw: &RawWeatherResponse) -> impl Iterator<Item = HourlyRecord> + '_ {
    raw.days.iter().flat_map(|day| {
        let date = day.datetime.as_deref();
        day.hours.iter().map(move |hour| hourly_record(hour, date))
    })
}

fn hourly_record(hour: &RawObservation, day_date: Option<&str>) -> HourlyRecord {
    let datetime = hour.datetime.as_deref().and_then(|value| {
        let resolved = resolve_timestamp(value, day_date);
        if resolved.is_none() {
            warn!(datetime = value, day = ?day_date, "hourly datetime could not be resolved");
        }
        resolved
    });

    HourlyRecord {
        datetime,
        temp: hour.temp,
        feelslike: hour.feelslike,
        windspeed: hour.windspeed,
        windgust: hour.windgust,
        winddir: hour.winddir,
        precip: hour.precip,
        precipprob: hour.precipprob,
        humidity: hour.humidity,
        visibility: hour.visibility,
        cloudcover: hour.cloudcover,
        pressure: hour.pressure,
    }
}

fn alert_record(alert: &RawAlert) -> AlertRecord {
    let expires = alert.expires.as_deref().and_then(|value| {
        let parsed = parse_full_datetime(value);
        if parsed.is_none() {
            warn!(
                event = alert.event.as_deref(),
                expires = value,
                "alert expiry is not a recognised date-time, storing NULL"
            );
        }
        parsed
    });

    AlertRecord {
        event: alert.event.clone(),
        description: alert.description.clone(),
        expires,
    }
}

/// Turns a provider timestamp into a full date-time.
///
/// `HH:MM:SS` values are combined with `day_date` (`YYYY-MM-DD`); without a
/// usable day date the timestamp cannot be completed and `None` is returned.
pub fn resolve_timestamp(value: &str, day_date: Option<&str>) -> Option<NaiveDateTime> {
    if value.len() == TIME_ONLY_LEN {
        let time = NaiveTime::parse_from_str(value, "%H:%M:%S").ok()?;
        let date = NaiveDate::parse_from_str(day_date?, "%Y-%m-%d").ok()?;
        return Some(date.and_time(time));
    }
    parse_full_datetime(value)
}

/// Offsets are dropped; the wall-clock time at the location is kept.
pub fn parse_full_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
