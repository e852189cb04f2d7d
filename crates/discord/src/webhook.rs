use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use yambot_core::{RemoteOption, WebhookResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &str, payload: &Map<String, Value>) -> WebhookResponse;
}

#[async_trait]
pub trait RemoteOptionSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<RemoteOption>, RemoteOptionError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteOptionError {
    #[error("invalid remote options url `{0}`")]
    InvalidUrl(String),
    #[error("failed to fetch remote options: {0}")]
    Transport(String),
    #[error("remote options endpoint returned status {0}")]
    Status(u16),
    #[error("failed to decode remote options: {0}")]
    Decode(String),
}

/// Posts submitted inputs as JSON. Every failure is folded into the returned
/// [`WebhookResponse`].
#[derive(Clone, Debug)]
pub struct WebhookClient {
    http: Client,
    timeout: Duration,
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(Client::new(), timeout)
    }

    pub fn with_client(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl WebhookSender for WebhookClient {
    async fn send(&self, url: &str, payload: &Map<String, Value>) -> WebhookResponse {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(error) => {
                warn!(event_name = "integration.webhook.encode_failed", url, error = %error, "could not encode webhook payload");
                return WebhookResponse::failure(0, "Failed to prepare webhook data");
            }
        };

        let target = match Url::parse(url) {
            Ok(target) => target,
            Err(error) => {
                warn!(event_name = "integration.webhook.invalid_url", url, error = %error, "could not build webhook request");
                return WebhookResponse::failure(0, "Failed to create webhook request");
            }
        };

        let sent = self
            .http
            .post(target)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                warn!(event_name = "integration.webhook.send_failed", url, error = %error, "webhook request failed");
                return WebhookResponse::failure(0, "Failed to send webhook");
            }
        };

        let status = response.status();
        let result = if status.is_success() {
            let data = match response.bytes().await {
                Ok(bytes) => serde_json::from_slice::<Map<String, Value>>(&bytes).ok(),
                Err(error) => {
                    debug!(url, error = %error, "webhook response body could not be read");
                    None
                }
            };
            WebhookResponse::success(status.as_u16(), data)
        } else {
            WebhookResponse::failure(
                status.as_u16(),
                format!("Webhook returned status {}", status.as_u16()),
            )
        };

        info!(
            event_name = "integration.webhook.sent",
            url,
            status = result.status.as_str(),
            status_code = result.status_code,
            "webhook call finished"
        );
        result
    }
}

/// Fetches dynamic choices for `remote_select` fields.
#[derive(Clone, Debug)]
pub struct RemoteOptionResolver {
    http: Client,
    timeout: Duration,
}

impl Default for RemoteOptionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RemoteOptionResolver {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(Client::new(), timeout)
    }

    pub fn with_client(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>, RemoteOptionError> {
        let response = self
            .http
            .get(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| RemoteOptionError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteOptionError::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|error| RemoteOptionError::Transport(error.to_string()))
    }
}

#[async_trait]
impl RemoteOptionSource for RemoteOptionResolver {
    async fn fetch(&self, url: &str) -> Result<Vec<RemoteOption>, RemoteOptionError> {
        let target = Url::parse(url).map_err(|_| RemoteOptionError::InvalidUrl(url.to_owned()))?;

        let body = self.get(&target).await?;
        let options = match serde_json::from_slice::<Vec<RemoteOption>>(&body) {
            Ok(options) => options,
            Err(error) => {
                debug!(
                    event_name = "integration.remote_options.fallback_decode",
                    url,
                    error = %error,
                    "label/value decode failed; refetching as generic objects"
                );
                let body = self.get(&target).await?;
                let items = serde_json::from_slice::<Vec<Map<String, Value>>>(&body)
                    .map_err(|error| RemoteOptionError::Decode(error.to_string()))?;
                items.iter().filter_map(option_from_object).collect()
            }
        };

        info!(
            event_name = "integration.remote_options.fetched",
            url,
            count = options.len(),
            "fetched remote options"
        );
        Ok(options)
    }
}

fn option_from_object(item: &Map<String, Value>) -> Option<RemoteOption> {
    let option = if let Some(name) = item.get("name").and_then(Value::as_str) {
        RemoteOption::new(name, name)
    } else if let Some(title) = item.get("title").and_then(Value::as_str) {
        RemoteOption::new(title, title)
    } else {
        let id = match item.get("id")? {
            Value::Null => return None,
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        RemoteOption::new(format!("ID: {id}"), id)
    };

    (!option.label.is_empty() && !option.value.is_empty()).then_some(option)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Map, Value};
    use yambot_core::{RemoteOption, WebhookStatus};

    use super::{
        RemoteOptionError, RemoteOptionResolver, RemoteOptionSource, WebhookClient, WebhookSender,
    };

    async fn serve(router: Router) -> SocketAddr {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }

    fn payload() -> Map<String, Value> {
        json!({"title": "Laptop"}).as_object().cloned().expect("object payload")
    }

    #[tokio::test]
    async fn success_decodes_object_body() {
        let addr = serve(Router::new().route(
            "/hook",
            post(|Json(body): Json<Value>| async move {
                (StatusCode::CREATED, Json(json!({"ticket_id": "T-1", "echo": body["title"]})))
            }),
        ))
        .await;

        let response = WebhookClient::default().send(&format!("http://{addr}/hook"), &payload()).await;

        assert_eq!(response.status, WebhookStatus::Success);
        assert_eq!(response.status_code, 201);
        let data = response.data.expect("decoded data");
        assert_eq!(data["ticket_id"], json!("T-1"));
        assert_eq!(data["echo"], json!("Laptop"));
    }

    #[tokio::test]
    async fn success_tolerates_non_object_body() {
        let addr = serve(Router::new().route("/hook", post(|| async { "accepted" }))).await;

        let response = WebhookClient::default().send(&format!("http://{addr}/hook"), &payload()).await;

        assert!(response.is_success());
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn server_error_becomes_error_status() {
        let addr = serve(Router::new().route(
            "/hook",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let response = WebhookClient::default().send(&format!("http://{addr}/hook"), &payload()).await;

        assert_eq!(response.status, WebhookStatus::Error);
        assert_eq!(response.status_code, 500);
        assert_eq!(response.error.as_deref(), Some("Webhook returned status 500"));
    }

    #[tokio::test]
    async fn unreachable_host_reports_zero_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("address");
        drop(listener);

        let client = WebhookClient::new(Duration::from_secs(2));
        let response = client.send(&format!("http://{addr}/hook"), &payload()).await;

        assert_eq!(response.status, WebhookStatus::Error);
        assert_eq!(response.status_code, 0);
        assert_eq!(response.error.as_deref(), Some("Failed to send webhook"));
    }

    #[tokio::test]
    async fn malformed_url_is_a_request_error() {
        let response = WebhookClient::default().send("not a url", &payload()).await;

        assert_eq!(response.status_code, 0);
        assert_eq!(response.error.as_deref(), Some("Failed to create webhook request"));
    }

    #[tokio::test]
    async fn remote_options_decode_label_value_pairs() {
        let addr = serve(Router::new().route(
            "/options",
            get(|| async { Json(json!([{"label": "Alpha", "value": "a"}, {"label": "Beta", "value": "b"}])) }),
        ))
        .await;

        let options = RemoteOptionResolver::default()
            .fetch(&format!("http://{addr}/options"))
            .await
            .expect("options");

        assert_eq!(options, vec![RemoteOption::new("Alpha", "a"), RemoteOption::new("Beta", "b")]);
    }

    #[tokio::test]
    async fn remote_options_fall_back_to_generic_objects_with_second_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let addr = serve(Router::new().route(
            "/options",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!([{"name": "Alice"}, {"title": "Bob"}, {"id": 7}, {"name": ""}, {"other": 1}]))
                }
            }),
        ))
        .await;

        let options = RemoteOptionResolver::default()
            .fetch(&format!("http://{addr}/options"))
            .await
            .expect("options");

        assert_eq!(
            options,
            vec![
                RemoteOption::new("Alice", "Alice"),
                RemoteOption::new("Bob", "Bob"),
                RemoteOption::new("ID: 7", "7"),
            ]
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn remote_options_surface_status_and_decode_failures() {
        let addr = serve(
            Router::new()
                .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
                .route("/garbage", get(|| async { "not json" })),
        )
        .await;
        let resolver = RemoteOptionResolver::default();

        assert_eq!(
            resolver.fetch(&format!("http://{addr}/down")).await,
            Err(RemoteOptionError::Status(503))
        );
        assert!(matches!(
            resolver.fetch(&format!("http://{addr}/garbage")).await,
            Err(RemoteOptionError::Decode(_))
        ));
        assert!(matches!(resolver.fetch("::").await, Err(RemoteOptionError::InvalidUrl(_))));
    }
}
