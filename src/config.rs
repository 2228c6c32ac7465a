use std::fmt;

use anyhow::Context;

pub const API_KEY_VAR: &str = "VISUAL_CROSSING_API_KEY";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const BASE_URL_VAR: &str = "WEATHER_API_BASE_URL";
pub const LOCATION_VAR: &str = "WEATHER_LOCATION";

pub const DEFAULT_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";
pub const DEFAULT_LOCATION: &str = "Hann Münden";

/// Runtime settings. Credentials come from the environment only and are
/// checked lazily, so commands that never touch the database don't need one.
#[derive(Clone)]
pub struct Config {
    api_key: Option<String>,
    database_url: Option<String>,
    pub base_url: String,
    pub location: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            api_key: read(API_KEY_VAR),
            database_url: read(DATABASE_URL_VAR),
            base_url: read(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            location: read(LOCATION_VAR).unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        }
    }

    pub fn api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .with_context(|| format!("{API_KEY_VAR} must be set to a Visual Crossing API key"))
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .with_context(|| format!("{DATABASE_URL_VAR} must be set to the weather Postgres instance"))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("api_key", &redact(&self.api_key))
            .field("database_url", &redact(&self.database_url))
            .field("base_url", &self.base_url)
            .field("location", &self.location)
            .finish()
    }
}
