//! REST document store with server-sent-event streaming
//!
//! Documents live at `{base-url}/{collection}/{key}.json`. Merge writes are
//! `PATCH`, deletes are `DELETE`, and the collection is streamed with
//! `GET {base-url}/{collection}.json` as an event stream of `put`/`patch`
//! events that are folded into a [`Mirror`] and re-emitted as full snapshots.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Documents, Mirror, RemoteStore, StoreError, StoreEvent, SubscriptionHandle};
use crate::config::StoreConfig;

/// Maximum number of reconnect attempts before the subscription gives up
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for reconnects
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Payload of `put` and `patch` stream events
#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// What one stream event means for the subscriber
#[derive(Debug)]
enum StreamAction {
    /// Mirror changed; deliver the full set
    Snapshot(Documents),
    /// Nothing to deliver
    Ignore,
    /// Server ended the subscription for good
    Fatal(StoreError),
}

/// How one connection ended
enum StreamExit {
    /// Subscriber gone or server refused; do not reconnect
    Finished,
    /// Connection dropped; reconnect after backoff
    Retry(StoreError),
}

/// Interpret one named stream event against the mirror
fn interpret(event: &str, data: &str, mirror: &mut Mirror) -> Result<StreamAction, StoreError> {
    debug!(%event, data_len = data.len(), "interpret: called");
    match event {
        "put" | "patch" => {
            let payload: PathData =
                serde_json::from_str(data).map_err(|e| StoreError::InvalidResponse(format!("{} event: {}", event, e)))?;
            if event == "put" {
                mirror.apply_put(&payload.path, payload.data);
            } else {
                mirror.apply_patch(&payload.path, payload.data);
            }
            Ok(StreamAction::Snapshot(mirror.documents()))
        }
        "keep-alive" => Ok(StreamAction::Ignore),
        "cancel" => Ok(StreamAction::Fatal(StoreError::Cancelled(
            serde_json::from_str::<Option<String>>(data)
                .ok()
                .flatten()
                .unwrap_or_else(|| "permission denied".to_string()),
        ))),
        "auth_revoked" => Ok(StreamAction::Fatal(StoreError::AuthRevoked)),
        other => {
            debug!(event = %other, "interpret: unknown event type");
            Ok(StreamAction::Ignore)
        }
    }
}

async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text)
}

async fn check_status(response: Response) -> Result<(), StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = error_message(response).await;
    debug!(status = status.as_u16(), %message, "check_status: error response");
    Err(StoreError::from_status(status.as_u16(), message))
}

/// REST + event-stream store client
pub struct HttpRemoteStore {
    base_url: String,
    credential: Option<String>,
    http: Client,
    /// Client without a request timeout, for long-lived streams
    stream_http: Client,
}

impl HttpRemoteStore {
    /// Create a store client from configuration
    ///
    /// `credential` is sent as the `auth` query parameter when present.
    pub fn from_config(config: &StoreConfig, credential: Option<String>) -> Result<Self, StoreError> {
        debug!(base_url = %config.base_url, has_credential = credential.is_some(), "HttpRemoteStore::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(StoreError::Network)?;
        let stream_http = Client::builder().build().map_err(StoreError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential,
            http,
            stream_http,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}.json", self.base_url, collection.trim_matches('/'))
    }

    fn document_url(&self, collection: &str, key: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, collection.trim_matches('/'), key)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn subscribe(
        &self,
        collection: &str,
        sink: mpsc::UnboundedSender<StoreEvent>,
    ) -> Result<SubscriptionHandle, StoreError> {
        debug!(%collection, "HttpRemoteStore::subscribe: called");
        let request = self.authorize(self.stream_http.get(self.collection_url(collection)));
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            run_stream(request, sink).await;
            debug!(%collection, "HttpRemoteStore: stream task finished");
        });

        Ok(SubscriptionHandle::new(move || task.abort()))
    }

    async fn write_merge(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        debug!(%collection, %key, field_count = fields.len(), "HttpRemoteStore::write_merge: called");
        let request = self.authorize(self.http.patch(self.document_url(collection, key)).json(&fields));
        check_status(request.send().await?).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        debug!(%collection, %key, "HttpRemoteStore::delete: called");
        let request = self.authorize(self.http.delete(self.document_url(collection, key)));
        check_status(request.send().await?).await
    }
}

/// Keep one subscription alive, reconnecting with backoff
async fn run_stream(request: RequestBuilder, sink: mpsc::UnboundedSender<StoreEvent>) {
    debug!("run_stream: called");
    let mut mirror = Mirror::new();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
            warn!(attempt, backoff_ms = backoff, "run_stream: reconnecting after error");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }

        let Some(builder) = request.try_clone() else {
            let _ = sink.send(StoreEvent::Error(StoreError::Stream(
                "subscription request cannot be replayed".to_string(),
            )));
            return;
        };
        let mut es = match EventSource::new(builder) {
            Ok(es) => es,
            Err(e) => {
                debug!(error = %e, "run_stream: EventSource creation failed");
                let _ = sink.send(StoreEvent::Error(StoreError::Stream(e.to_string())));
                return;
            }
        };

        let exit = pump(&mut es, &mut mirror, &sink, &mut attempt).await;
        es.close();

        match exit {
            StreamExit::Finished => {
                debug!("run_stream: finished");
                return;
            }
            StreamExit::Retry(err) => {
                if sink.send(StoreEvent::Error(err)).is_err() {
                    return;
                }
                attempt += 1;
                if attempt > MAX_RETRIES {
                    warn!(attempts = MAX_RETRIES, "run_stream: giving up on subscription");
                    let _ = sink.send(StoreEvent::Error(StoreError::Unavailable(format!(
                        "subscription dropped after {} reconnect attempts",
                        MAX_RETRIES
                    ))));
                    return;
                }
            }
        }
    }
}

/// Forward events from one connection until it ends
async fn pump(
    es: &mut EventSource,
    mirror: &mut Mirror,
    sink: &mpsc::UnboundedSender<StoreEvent>,
    attempt: &mut u32,
) -> StreamExit {
    while let Some(event) = es.next().await {
        match event {
            Ok(Event::Open) => {
                info!("Plan stream connected");
                *attempt = 0;
            }
            Ok(Event::Message(msg)) => match interpret(&msg.event, &msg.data, mirror) {
                Ok(StreamAction::Snapshot(docs)) => {
                    debug!(doc_count = docs.len(), "pump: delivering snapshot");
                    if sink.send(StoreEvent::Snapshot(docs)).is_err() {
                        debug!("pump: subscriber gone");
                        return StreamExit::Finished;
                    }
                }
                Ok(StreamAction::Ignore) => {}
                Ok(StreamAction::Fatal(err)) => {
                    warn!(error = %err, "pump: server ended subscription");
                    let _ = sink.send(StoreEvent::Error(err));
                    return StreamExit::Finished;
                }
                Err(err) => {
                    warn!(error = %err, "pump: skipping malformed event");
                }
            },
            Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                let err = StoreError::from_status(status.as_u16(), error_message(response).await);
                if err.is_retryable() {
                    return StreamExit::Retry(err);
                }
                warn!(error = %err, "pump: subscription refused");
                let _ = sink.send(StoreEvent::Error(err));
                return StreamExit::Finished;
            }
            Err(reqwest_eventsource::Error::StreamEnded) => {
                debug!("pump: stream ended");
                return StreamExit::Retry(StoreError::Stream("connection closed by server".to_string()));
            }
            Err(e) => {
                debug!(error = %e, "pump: stream error");
                return StreamExit::Retry(StoreError::Stream(e.to_string()));
            }
        }
    }

    StreamExit::Retry(StoreError::Stream("event stream closed".to_string()))
}
