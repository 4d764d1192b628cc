pub mod error;
pub mod models;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;

use self::{
    error::FetchError,
    models::{Alert, AlertsEnvelope, Reading, ReadingsEnvelope},
};

/// Read-only access to the monitoring backend.
///
/// Every call is a fresh round trip: no retries, no caching. Retries are the
/// poller's business.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Most recent alerts, newest first as delivered by the backend.
    async fn fetch_recent_alerts(&self) -> Result<Vec<Alert>, FetchError>;

    /// Recent readings, oldest first as delivered by the backend.
    async fn fetch_recent_readings(&self) -> Result<Vec<Reading>, FetchError>;
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    async fn fetch_recent_alerts(&self) -> Result<Vec<Alert>, FetchError> {
        (**self).fetch_recent_alerts().await
    }

    async fn fetch_recent_readings(&self) -> Result<Vec<Reading>, FetchError> {
        (**self).fetch_recent_readings().await
    }
}

#[derive(Debug, Clone)]
pub struct MonitorClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
}

impl MonitorClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(&config.base_url, http))
    }

    /// Use a pre-configured `reqwest::Client`. `base_url` must not end in `/`.
    pub fn with_client(base_url: &str, http: Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.to_owned(),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(url = %url, "Fetching");

        let response = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Network { url: url.clone(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status: status.as_u16() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network { url: url.clone(), source })?;

        serde_json::from_slice::<T>(&bytes).map_err(|source| FetchError::Body { url, source })
    }
}

#[async_trait]
impl DataSource for MonitorClient {
    async fn fetch_recent_alerts(&self) -> Result<Vec<Alert>, FetchError> {
        let envelope: AlertsEnvelope = self.get_json("/alerts/recent").await?;
        debug!(count = envelope.alerts.len(), "Fetched recent alerts");
        Ok(envelope.alerts)
    }

    async fn fetch_recent_readings(&self) -> Result<Vec<Reading>, FetchError> {
        let envelope: ReadingsEnvelope = self.get_json("/readings/recent").await?;
        debug!(count = envelope.readings.len(), "Fetched recent readings");
        Ok(envelope.readings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{error::FetchErrorKind, *};

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> MonitorClient {
        MonitorClient::with_client(&server.uri(), Client::new())
    }

    #[tokio::test]
    async fn fetches_alerts_in_delivered_order() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/alerts/recent",
            ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [
                    {
                        "_id": "a2",
                        "timestamp": "2024-06-04T13:50:00",
                        "appliance_id": "laptop",
                        "power": 3000.0,
                        "threshold": 2500.0,
                        "message": "Spike"
                    },
                    {
                        "_id": "a1",
                        "timestamp": "2024-06-04T13:40:00",
                        "appliance_id": "kettle",
                        "power": 2900.0,
                        "threshold": 2400.0,
                        "message": "Older spike"
                    }
                ]
            })),
        )
        .await;

        let alerts = client_for(&server).fetch_recent_alerts().await.unwrap();
        let ids: Vec<_> = alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a2", "a1"]);
        assert_eq!(alerts[1].appliance_id, "kettle");
    }

    #[tokio::test]
    async fn fetches_readings() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/readings/recent",
            ResponseTemplate::new(200).set_body_json(json!({
                "readings": [
                    { "_id": "r1", "timestamp": "2024-06-04T13:00:00", "power": 41.5 },
                    { "_id": "r2", "timestamp": "2024-06-04T13:01:00", "power": 44.0 }
                ]
            })),
        )
        .await;

        let readings = client_for(&server).fetch_recent_readings().await.unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].power, 41.5);
    }

    #[tokio::test]
    async fn empty_array_is_success() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/alerts/recent",
            ResponseTemplate::new(200).set_body_json(json!({ "alerts": [] })),
        )
        .await;

        assert!(client_for(&server).fetch_recent_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_protocol_error() {
        let server = MockServer::start().await;
        mount(&server, "/alerts/recent", ResponseTemplate::new(500)).await;

        let err = client_for(&server).fetch_recent_alerts().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Protocol);
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert!(err.url().ends_with("/alerts/recent"));
    }

    #[tokio::test]
    async fn missing_array_field_is_protocol_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/readings/recent",
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })),
        )
        .await;

        let err = client_for(&server).fetch_recent_readings().await.unwrap_err();
        assert!(matches!(err, FetchError::Body { .. }));
    }

    #[tokio::test]
    async fn non_array_field_is_protocol_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/alerts/recent",
            ResponseTemplate::new(200).set_body_json(json!({ "alerts": "none" })),
        )
        .await;

        let err = client_for(&server).fetch_recent_alerts().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Protocol);
    }

    #[tokio::test]
    async fn non_json_body_is_protocol_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/readings/recent",
            ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
        )
        .await;

        let err = client_for(&server).fetch_recent_readings().await.unwrap_err();
        assert!(matches!(err, FetchError::Body { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        // Bind then drop to get a local port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = MonitorClient::with_client(&format!("http://127.0.0.1:{port}"), Client::new());

        let err = client.fetch_recent_alerts().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Network);
    }

    #[tokio::test]
    async fn timeout_is_network_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/alerts/recent",
            ResponseTemplate::new(200)
                .set_body_json(json!({ "alerts": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .await;

        let http = Client::builder().timeout(Duration::from_millis(50)).build().unwrap();
        let client = MonitorClient::with_client(&server.uri(), http);

        let err = client.fetch_recent_alerts().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Network);
    }

    #[test]
    fn client_from_config_keeps_base_url() {
        let config = Config::from_lookup(|key| match key {
            "MONITOR_BASE_URL" => Some("http://energy.local:8000/".to_owned()),
            _ => None,
        })
        .unwrap();
        let client = MonitorClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://energy.local:8000");
    }
}
