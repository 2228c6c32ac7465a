use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{DateRange, RawWeatherResponse, UnitGroup};

/// Why a timeline request produced nothing usable. Callers abort the run on any variant.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid weather API url: {0}")]
    Url(String),

    #[error("failed to reach weather API: {0}")]
    Transport(reqwest::Error),

    #[error("weather API request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to parse weather API JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weather API response contained no current conditions, days or alerts")]
    Empty,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // The request url carries the API key as a query parameter.
        FetchError::Transport(err.without_url())
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    api_key: String,
    base_url: String,
    unit_group: UnitGroup,
    http: Client,
}

impl WeatherClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            unit_group: UnitGroup::default(),
            http: Client::new(),
        }
    }

    pub fn with_unit_group(mut self, unit_group: UnitGroup) -> Self {
        self.unit_group = unit_group;
        self
    }

    /// `{base}/{location}/{start}/{end}` with each segment percent-encoded.
    pub fn timeline_url(&self, location: &str, range: &DateRange) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| FetchError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| FetchError::Url(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .push(location)
            .push(&range.start().format("%Y-%m-%d").to_string())
            .push(&range.end().format("%Y-%m-%d").to_string());
        Ok(url)
    }

    /// Single attempt, no retry. Failures are logged here and handed back tagged.
    pub async fn fetch(
        &self,
        location: &str,
        range: &DateRange,
    ) -> Result<RawWeatherResponse, FetchError> {
        let result = self.request(location, range).await;
        if let Err(err) = &result {
            error!(location, %range, error = %err, "weather fetch failed");
        }
        result
    }

    async fn request(
        &self,
        location: &str,
        range: &DateRange,
    ) -> Result<RawWeatherResponse, FetchError> {
        let url = self.timeline_url(location, range)?;
        debug!(path = url.path(), unit_group = %self.unit_group, "requesting weather timeline");

        let res = self
            .http
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("unitGroup", self.unit_group.as_str()),
                ("contentType", "json"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let parsed: RawWeatherResponse = serde_json::from_str(&body)?;
        if parsed.is_empty() {
            return Err(FetchError::Empty);
        }

        Ok(parsed)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 12, 15).expect("valid date"),
            NaiveDate::from_ymd_opt(2024, 12, 17).expect("valid date"),
        )
        .expect("valid range")
    }

    fn client_for(server: &MockServer) -> WeatherClient {
        WeatherClient::new("TEST_KEY", format!("{}/timeline", server.uri()))
    }

    fn timeline_body() -> serde_json::Value {
        serde_json::json!({
            "days": [{"datetime": "2024-12-15", "hours": [{"datetime": "00:00:00", "temp": 39.0}]}],
            "currentConditions": {"datetime": "14:30:00", "temp": 41.0}
        })
    }

    #[test]
    fn timeline_url_percent_encodes_location() {
        let client = WeatherClient::new("KEY", "https://example.com/rest/services/timeline/");
        let url = client
            .timeline_url("Hann Münden", &range())
            .expect("url builds");

        assert_eq!(
            url.path(),
            "/rest/services/timeline/Hann%20M%C3%BCnden/2024-12-15/2024-12-17"
        );
    }

    #[test]
    fn timeline_url_rejects_invalid_base() {
        let client = WeatherClient::new("KEY", "not a url");
        let err = client.timeline_url("Berlin", &range()).unwrap_err();
        assert!(matches!(err, FetchError::Url(_)));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "ü".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn fetch_returns_parsed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/timeline/[^/]+/2024-12-15/2024-12-17$"))
            .and(query_param("key", "TEST_KEY"))
            .and(query_param("unitGroup", "us"))
            .and(query_param("contentType", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timeline_body()))
            .expect(1)
            .mount(&server)
            .await;

        let raw = client_for(&server)
            .fetch("Hann Münden", &range())
            .await
            .expect("fetch succeeds");

        assert_eq!(raw.days.len(), 1);
        assert_eq!(raw.first_day_date(), Some("2024-12-15"));
        assert!(raw.current_conditions.is_some());
    }

    #[tokio::test]
    async fn fetch_sends_metric_unit_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("unitGroup", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timeline_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .with_unit_group(UnitGroup::Metric)
            .fetch("Berlin", &range())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_success_status_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("No account found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("Berlin", &range())
            .await
            .unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "No account found");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("Berlin", &range())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn empty_object_is_an_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("Berlin", &range())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client = WeatherClient::new("SECRET_KEY", "http://127.0.0.1:1/timeline");

        let err = client.fetch("Berlin", &range()).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert!(!err.to_string().contains("SECRET_KEY"));
    }
}
