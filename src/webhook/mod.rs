pub mod server;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::data_dir;
use crate::error::{ApiError, NodeError, Result};
use crate::model::reference::positive_integer;
use crate::model::webhook::{WebhookRegistration, WebhookSubscription};
use crate::transport::{ApiRequest, Transport};

/// Header Businessmap puts the subscription secret in.
pub const SECRET_HEADER: &str = "x-kanbanize-secret";

pub const FORBIDDEN_MESSAGE: &str = "Forbidden: invalid or missing secret";

/// Persistent per-registration state, keyed by the delivery URL.
pub trait WebhookStore: Send + Sync {
    fn load(&self, key: &str) -> Result<WebhookRegistration>;
    fn save(&self, key: &str, registration: &WebhookRegistration) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    registrations: BTreeMap<String, WebhookRegistration>,
}

/// Registrations kept in `webhooks.json` under the data directory.
pub struct FileWebhookStore {
    path: PathBuf,
}

impl FileWebhookStore {
    pub fn new() -> Self {
        Self::at(data_dir().join("webhooks.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreData> {
        if !self.path.exists() {
            return Ok(StoreData::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            NodeError::Storage(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        // A corrupt file starts over rather than blocking registration.
        Ok(serde_json::from_str(&contents).unwrap_or_default())
    }

    fn write(&self, data: &StoreData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NodeError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| NodeError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| {
            NodeError::Storage(format!("Failed to write {}: {e}", self.path.display()))
        })
    }
}

impl Default for FileWebhookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookStore for FileWebhookStore {
    fn load(&self, key: &str) -> Result<WebhookRegistration> {
        Ok(self
            .read()?
            .registrations
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    fn save(&self, key: &str, registration: &WebhookRegistration) -> Result<()> {
        let mut data = self.read()?;
        data.registrations
            .insert(key.to_string(), registration.clone());
        self.write(&data)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut data = self.read()?;
        if data.registrations.remove(key).is_some() {
            self.write(&data)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWebhookStore {
    registrations: Mutex<BTreeMap<String, WebhookRegistration>>,
}

impl MemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, WebhookRegistration>>> {
        self.registrations
            .lock()
            .map_err(|_| NodeError::Storage("webhook store lock poisoned".into()))
    }
}

impl WebhookStore for MemoryWebhookStore {
    fn load(&self, key: &str) -> Result<WebhookRegistration> {
        Ok(self.entries()?.get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &str, registration: &WebhookRegistration) -> Result<()> {
        self.entries()?
            .insert(key.to_string(), registration.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Drives the remote subscription for one delivery URL and board.
pub struct WebhookRegistrar<'a> {
    transport: &'a dyn Transport,
    store: &'a dyn WebhookStore,
    url: String,
    board_id: u64,
    authenticate: bool,
}

impl<'a> WebhookRegistrar<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        store: &'a dyn WebhookStore,
        url: impl Into<String>,
        board_id: u64,
        authenticate: bool,
    ) -> Self {
        Self {
            transport,
            store,
            url: url.into(),
            board_id,
            authenticate,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Look for a remote subscription already pointing at our URL and
    /// remember its id.
    pub async fn check_exists(&self) -> Result<bool> {
        let response = self.transport.request(ApiRequest::get("/webhooks")).await?;
        let Some(Value::Array(subscriptions)) = response.envelope_data() else {
            return Err(NodeError::invalid_response(
                "Unexpected format when loading webhooks",
                response.data.clone(),
            ));
        };

        // Entries are matched on their url alone; the rest of each one may
        // be in any shape.
        let Some(found) = subscriptions
            .iter()
            .find(|s| s.get("url").and_then(Value::as_str) == Some(self.url.as_str()))
        else {
            debug!(url = %self.url, "No matching webhook subscription");
            return Ok(false);
        };
        let webhook_id = found.get("webhook_id").and_then(positive_integer);

        let mut registration = self.store.load(&self.url)?;
        registration.webhook_id = webhook_id;
        self.store.save(&self.url, &registration)?;
        debug!(url = %self.url, ?webhook_id, "Webhook already registered");
        Ok(true)
    }

    pub async fn create(&self) -> Result<bool> {
        let request = ApiRequest::post("/webhooks")
            .body(json!({ "url": self.url, "board_id": self.board_id }));
        let response = self.transport.request(request).await.map_err(|err| {
            let description = err.description().unwrap_or_else(|| err.to_string());
            NodeError::Api(ApiError::new(format!("Unexpected response: {description}")))
        })?;

        let created: WebhookSubscription = response
            .envelope_data()
            .cloned()
            .and_then(|data| serde_json::from_value(data).ok())
            .ok_or_else(|| {
                NodeError::invalid_response(
                    "Unexpected response when creating webhook",
                    response.data.clone(),
                )
            })?;

        let registration = WebhookRegistration {
            webhook_id: Some(created.webhook_id),
            secret: created.secret,
            authenticate: self.authenticate,
        };
        self.store.save(&self.url, &registration)?;
        info!(url = %self.url, webhook_id = created.webhook_id, "Webhook registered");
        Ok(true)
    }

    /// Remove the remote subscription. Without a known id there is nothing
    /// to do; a failed remote delete leaves local state untouched.
    pub async fn delete(&self) -> Result<bool> {
        let mut registration = self.store.load(&self.url)?;
        let Some(webhook_id) = registration.webhook_id else {
            return Ok(false);
        };

        self.transport
            .request(ApiRequest::delete(format!("/webhooks/{webhook_id}")).body(json!({})))
            .await?;

        registration.webhook_id = None;
        registration.secret = None;
        self.store.save(&self.url, &registration)?;
        info!(url = %self.url, webhook_id, "Webhook deleted");
        Ok(true)
    }
}

/// Events a subscriber wants delivered, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    events: Vec<String>,
}

impl EventFilter {
    pub fn new<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            events: events
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, event: &str) -> bool {
        let event = event.to_lowercase();
        self.events.iter().any(|e| e == "all" || *e == event)
    }
}

/// What became of one inbound delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Secret check failed; answered with 403 and nothing is triggered.
    Rejected,
    /// Accepted but the event is not one the subscriber asked for.
    Filtered { event: String },
    Triggered(Value),
}

impl Delivery {
    pub fn status_code(&self) -> u16 {
        match self {
            Delivery::Rejected => 403,
            _ => 200,
        }
    }

    pub fn response_body(&self) -> Value {
        match self {
            Delivery::Rejected => json!({ "message": FORBIDDEN_MESSAGE }),
            _ => json!({}),
        }
    }
}

/// Whether a delivery carrying `secret_header` may pass. Unauthenticated
/// registrations let everything through.
pub fn authorized(registration: &WebhookRegistration, secret_header: Option<&str>) -> bool {
    if !registration.authenticate {
        return true;
    }
    match (registration.secret.as_deref(), secret_header) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    }
}

pub fn handle_delivery(
    registration: &WebhookRegistration,
    secret_header: Option<&str>,
    body: Value,
    filter: &EventFilter,
) -> Delivery {
    if !authorized(registration, secret_header) {
        return Delivery::Rejected;
    }

    let event = body
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if filter.matches(&event) {
        Delivery::Triggered(body)
    } else {
        Delivery::Filtered { event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::transport::Method;

    const URL: &str = "https://hooks.example.com/webhook";

    fn registrar<'a>(transport: &'a MockTransport, store: &'a MemoryWebhookStore) -> WebhookRegistrar<'a> {
        WebhookRegistrar::new(transport, store, URL, 7, true)
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWebhookStore::at(dir.path().join("nested").join("webhooks.json"));
        assert_eq!(store.load(URL).unwrap(), WebhookRegistration::default());

        let registration = WebhookRegistration {
            webhook_id: Some(3),
            secret: Some("s3cret".into()),
            authenticate: true,
        };
        store.save(URL, &registration).unwrap();
        assert!(store.path().exists());
        assert_eq!(FileWebhookStore::at(store.path()).load(URL).unwrap(), registration);

        store.remove(URL).unwrap();
        assert_eq!(store.load(URL).unwrap(), WebhookRegistration::default());
    }

    #[test]
    fn corrupt_store_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhooks.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileWebhookStore::at(&path);
        assert_eq!(store.load(URL).unwrap(), WebhookRegistration::default());
    }

    #[tokio::test]
    async fn check_exists_matches_by_url_and_persists_id() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "webhook_id": 1, "url": "https://other/webhook" },
                { "webhook_id": 2, "url": URL, "is_enabled": 1 }
            ] }),
        );
        let store = MemoryWebhookStore::new();

        assert!(registrar(&transport, &store).check_exists().await.unwrap());
        assert_eq!(transport.last_request().path, "/webhooks");
        assert_eq!(store.load(URL).unwrap().webhook_id, Some(2));
    }

    #[tokio::test]
    async fn check_exists_without_match_leaves_store_alone() {
        let transport = MockTransport::new().reply(200, json!({ "data": [] }));
        let store = MemoryWebhookStore::new();
        assert!(!registrar(&transport, &store).check_exists().await.unwrap());
        assert_eq!(store.load(URL).unwrap(), WebhookRegistration::default());
    }

    #[tokio::test]
    async fn check_exists_tolerates_malformed_neighbours() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                "not-an-object",
                { "url": "https://other/webhook" },
                { "webhook_id": "oops", "url": 5 },
                { "webhook_id": "4", "url": URL }
            ] }),
        );
        let store = MemoryWebhookStore::new();

        assert!(registrar(&transport, &store).check_exists().await.unwrap());
        assert_eq!(store.load(URL).unwrap().webhook_id, Some(4));
    }

    #[tokio::test]
    async fn check_exists_rejects_non_list_payload() {
        let transport = MockTransport::new().reply(200, json!({ "data": { "oops": true } }));
        let store = MemoryWebhookStore::new();

        let err = registrar(&transport, &store).check_exists().await.unwrap_err();
        assert!(err.to_string().contains("Unexpected format when loading webhooks"));
    }

    #[tokio::test]
    async fn create_posts_url_and_board_then_stores_secret() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": { "webhook_id": 11, "url": URL, "secret": "abc", "is_enabled": 1 } }),
        );
        let store = MemoryWebhookStore::new();

        assert!(registrar(&transport, &store).create().await.unwrap());

        let request = transport.last_request();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(json!({ "url": URL, "board_id": 7 })));
        assert_eq!(
            store.load(URL).unwrap(),
            WebhookRegistration {
                webhook_id: Some(11),
                secret: Some("abc".into()),
                authenticate: true,
            }
        );
    }

    #[tokio::test]
    async fn create_failure_reports_upstream_description() {
        let upstream = ApiError::new("Request failed")
            .with_status(400)
            .with_description("board not found");
        let transport = MockTransport::new().fail(upstream.into());
        let store = MemoryWebhookStore::new();

        let err = registrar(&transport, &store).create().await.unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response: board not found");
        assert!(store.load(URL).unwrap().webhook_id.is_none());
    }

    #[tokio::test]
    async fn delete_without_known_id_is_a_no_op() {
        let transport = MockTransport::new();
        let store = MemoryWebhookStore::new();
        assert!(!registrar(&transport, &store).delete().await.unwrap());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn delete_clears_local_state() {
        let transport = MockTransport::new().reply(204, Value::Null);
        let store = MemoryWebhookStore::new();
        store
            .save(
                URL,
                &WebhookRegistration {
                    webhook_id: Some(5),
                    secret: Some("abc".into()),
                    authenticate: true,
                },
            )
            .unwrap();

        assert!(registrar(&transport, &store).delete().await.unwrap());
        assert_eq!(transport.last_request().path, "/webhooks/5");
        assert_eq!(transport.last_request().method, Method::Delete);
        let left = store.load(URL).unwrap();
        assert!(left.webhook_id.is_none());
        assert!(left.secret.is_none());
    }

    #[tokio::test]
    async fn failed_remote_delete_surfaces_and_keeps_state() {
        let transport = MockTransport::new().fail(ApiError::new("Webhook not found").with_status(404).into());
        let store = MemoryWebhookStore::new();
        let registration = WebhookRegistration {
            webhook_id: Some(5),
            secret: None,
            authenticate: false,
        };
        store.save(URL, &registration).unwrap();

        let err = registrar(&transport, &store).delete().await.unwrap_err();
        assert_eq!(err.http_code(), Some(404));
        assert_eq!(store.load(URL).unwrap(), registration);
    }

    #[test]
    fn event_filter_is_case_insensitive_with_wildcard() {
        let filter = EventFilter::new(["Card Created", "comment_added"]);
        assert!(filter.matches("card created"));
        assert!(filter.matches("COMMENT_ADDED"));
        assert!(!filter.matches("card_moved"));
        assert!(EventFilter::new(["All"]).matches("anything"));
    }

    #[test]
    fn authenticated_delivery_needs_matching_secret() {
        let registration = WebhookRegistration {
            webhook_id: Some(1),
            secret: Some("abc".into()),
            authenticate: true,
        };
        let filter = EventFilter::new(["all"]);
        let body = json!({ "event": "card_created" });

        let rejected = handle_delivery(&registration, Some("wrong"), body.clone(), &filter);
        assert_eq!(rejected, Delivery::Rejected);
        assert_eq!(rejected.status_code(), 403);
        assert_eq!(rejected.response_body(), json!({ "message": FORBIDDEN_MESSAGE }));

        assert_eq!(
            handle_delivery(&registration, None, body.clone(), &filter),
            Delivery::Rejected
        );
        assert_eq!(
            handle_delivery(&registration, Some("abc"), body.clone(), &filter),
            Delivery::Triggered(body)
        );
    }

    #[test]
    fn missing_stored_secret_rejects_even_empty_header() {
        let registration = WebhookRegistration {
            webhook_id: Some(1),
            secret: None,
            authenticate: true,
        };
        let delivery = handle_delivery(&registration, Some(""), json!({}), &EventFilter::new(["all"]));
        assert_eq!(delivery, Delivery::Rejected);
    }

    #[test]
    fn unauthenticated_delivery_is_filtered_by_event() {
        let registration = WebhookRegistration::default();
        let filter = EventFilter::new(["card_moved"]);

        let filtered = handle_delivery(&registration, None, json!({ "event": "card_created" }), &filter);
        assert_eq!(
            filtered,
            Delivery::Filtered {
                event: "card_created".into()
            }
        );
        assert_eq!(filtered.status_code(), 200);

        let body = json!({ "event": "Card_Moved", "card_id": 4 });
        assert_eq!(
            handle_delivery(&registration, None, body.clone(), &filter),
            Delivery::Triggered(body)
        );
    }
}
