//! List/watch over the Kubernetes custom-object REST endpoints.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use super::{EventStream, ListResult, ResourceKind, StreamItem, WatchApi, WatchCursor, WatchEvent, WatchOpen};
use crate::errors::WatchError;

/// Extra time allowed past the server-side watch timeout before the client
/// gives up on the connection.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// [`WatchApi`] backed by `reqwest`.
///
/// Watch responses are newline-delimited JSON. HTTP 410 on open and
/// in-stream `ERROR` events with code 410 are reported as stale cursors.
#[derive(Debug, Clone)]
pub struct KubeHttpApi {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

#[derive(Deserialize)]
struct ListBody {
    #[serde(default)]
    items: Vec<Value>,
    metadata: ListMeta,
}

#[derive(Deserialize)]
struct ListMeta {
    #[serde(rename = "resourceVersion")]
    resource_version: String,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    object: Value,
}

impl KubeHttpApi {
    /// Creates a client for an API server, e.g. `https://kubernetes.default.svc`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
        }
    }

    /// Uses a preconfigured HTTP client (TLS roots, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Authenticates with a bearer token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn request(&self, kind: &ResourceKind) -> reqwest::RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base_url, kind.api_path()));
        if let Some(selector) = &kind.label_selector {
            request = request.query(&[("labelSelector", selector)]);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        request
    }
}

#[async_trait]
impl WatchApi for KubeHttpApi {
    async fn list(&self, kind: &ResourceKind) -> Result<ListResult, WatchError> {
        let resource = kind.to_string();
        let response = self
            .request(kind)
            .send()
            .await
            .map_err(|e| WatchError::transient(&resource, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::from_status(resource, status.as_u16(), body));
        }

        let body: ListBody = response
            .json()
            .await
            .map_err(|e| WatchError::transient(&resource, e.to_string()))?;
        Ok(ListResult {
            items: body.items,
            resource_version: WatchCursor::new(body.metadata.resource_version),
        })
    }

    async fn watch(
        &self,
        kind: &ResourceKind,
        cursor: &WatchCursor,
        timeout: Duration,
    ) -> Result<WatchOpen, WatchError> {
        let resource = kind.to_string();
        let response = self
            .request(kind)
            .query(&[
                ("watch", "true"),
                ("allowWatchBookmarks", "true"),
                ("resourceVersion", cursor.as_str()),
            ])
            .query(&[("timeoutSeconds", timeout_seconds(timeout))])
            .timeout(timeout + CLIENT_TIMEOUT_SLACK)
            .send()
            .await
            .map_err(|e| WatchError::transient(&resource, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::GONE {
            return Ok(WatchOpen::Stale);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::from_status(resource, status.as_u16(), body));
        }

        debug!(%resource, resource_version = %cursor, "Watch opened");
        Ok(WatchOpen::Opened(ndjson_events(response.bytes_stream(), resource)))
    }
}

/// Whole seconds for `timeoutSeconds`, rounded up and never zero.
fn timeout_seconds(timeout: Duration) -> u64 {
    let whole = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    whole.max(1)
}

type ByteStream<B, E> = Pin<Box<dyn Stream<Item = Result<B, E>> + Send>>;

struct LineReader<B, E> {
    bytes: ByteStream<B, E>,
    buffer: Vec<u8>,
    resource: String,
    done: bool,
}

/// Splits a byte stream into watch stream items, one JSON document per line.
///
/// The stream ends after the first `Stale` or `Failed` item.
pub(crate) fn ndjson_events<S, B, E>(bytes: S, resource: String) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let reader = LineReader {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        resource,
        done: false,
    };

    futures::stream::unfold(reader, |mut reader| async move {
        loop {
            if reader.done {
                return None;
            }
            if let Some(end) = reader.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = reader.buffer.drain(..=end).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let item = parse_line(&line, &reader.resource);
                reader.done = !matches!(item, StreamItem::Event(_));
                return Some((item, reader));
            }
            match reader.bytes.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    reader.done = true;
                    let error = WatchError::transient(&reader.resource, e.to_string());
                    return Some((StreamItem::Failed(error), reader));
                }
                None => {
                    reader.done = true;
                    if reader.buffer.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let line = std::mem::take(&mut reader.buffer);
                    let item = parse_line(&line, &reader.resource);
                    return Some((item, reader));
                }
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8], resource: &str) -> StreamItem {
    let raw: RawEvent = match serde_json::from_slice(line) {
        Ok(raw) => raw,
        Err(e) => return StreamItem::Failed(WatchError::transient(resource, format!("bad watch line: {e}"))),
    };

    if raw.event_type == "ERROR" {
        let code = raw
            .object
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        if code == 410 {
            return StreamItem::Stale;
        }
        let message = raw
            .object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return StreamItem::Failed(WatchError::from_status(resource, code, message));
    }

    match serde_json::from_value(Value::String(raw.event_type.clone())) {
        Ok(event_type) => StreamItem::Event(WatchEvent::new(event_type, raw.object)),
        Err(_) => StreamItem::Failed(WatchError::transient(
            resource,
            format!("unknown watch event type {}", raw.event_type),
        )),
    }
}
