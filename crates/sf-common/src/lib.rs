use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Entity Types
// ============================================================================

/// Identifier of a server-resident record. The admin API hands out both
/// numeric and string ids, so both are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl EntityId {
    /// Read an id out of a JSON value (`1`, `"abc"`).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(EntityId::Number),
            serde_json::Value::String(s) => Some(EntityId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Number(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Text(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Text(id)
    }
}

/// A record the list/mutation layer can address by id.
pub trait Entity {
    fn id(&self) -> EntityId;
}

/// Untyped records. A value without a usable `id` field gets an empty text
/// id and never matches a real lookup.
impl Entity for serde_json::Value {
    fn id(&self) -> EntityId {
        self.get("id")
            .and_then(EntityId::from_json)
            .unwrap_or_else(|| EntityId::Text(String::new()))
    }
}

/// Name of a resource kind used for cache invalidation, e.g. `"admin-users"`.
pub type QueryKey = String;

// ============================================================================
// Pagination Types
// ============================================================================

fn default_page() -> u32 { 1 }
fn default_limit() -> u32 { 20 }

/// Page metadata as reported by the `pagination` field of an enveloped list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
}

impl PageMeta {
    pub fn from_total(page: u32, limit: u32, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total_pages(total, limit),
        }
    }
}

impl Default for PageMeta {
    fn default() -> Self {
        Self::from_total(default_page(), default_limit(), 0)
    }
}

/// The `pagination` object as the server sends it. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePageMeta {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl WirePageMeta {
    /// Complete the metadata for a response to `query` that carried
    /// `item_count` items. Missing or zero `page`/`limit` come from the query,
    /// a missing `total` falls back to `item_count`, and `total_pages` is
    /// always recomputed from `total` and `limit`.
    pub fn resolve(&self, query: &ListQuery, item_count: usize) -> PageMeta {
        let page = self.page.filter(|p| *p > 0).unwrap_or(query.page);
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(query.limit);
        let total = self.total.unwrap_or(item_count as u64);
        PageMeta::from_total(page, limit, total)
    }
}

/// `ceil(total / limit)`, or 0 when `limit` is 0.
pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit as u64) as u32
}

/// Parameters of a list fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    /// Empty means no filter
    pub search: String,
}

impl ListQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            page: default_page(),
            limit,
            search: String::new(),
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if !self.search.is_empty() {
            pairs.push(("search".to_string(), self.search.clone()));
        }
        pairs
    }
}

/// Lifecycle of a list synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(SyncError),
}

/// Snapshot of a synchronized page
#[derive(Debug, Clone)]
pub struct PageState<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
    pub state: LoadState,
}

impl<T> PageState<T> {
    pub fn new(limit: u32) -> Self {
        Self {
            items: Vec::new(),
            meta: PageMeta::from_total(default_page(), limit, 0),
            state: LoadState::Idle,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn error(&self) -> Option<&SyncError> {
        match &self.state {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Notification Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient, user-facing message about the outcome of an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            level,
            title: title.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, description)
    }
}

/// Sink for user-facing notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => info!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
            NotificationLevel::Error => warn!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures surfaced to callers of the list/mutation layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Rejected client-side before any request was made
    #[error("{message}")]
    Validation { message: String },

    /// The request did not complete
    #[error("Network error: {message}")]
    Network { message: String },

    /// A response arrived but reported failure
    #[error("{message}")]
    Server { status: u16, message: String },
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Validation { .. } => "ValidationError",
            SyncError::Network { .. } => "NetworkError",
            SyncError::Server { .. } => "ServerError",
        }
    }

    /// Text suitable for a notification body
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

// ============================================================================
// Mutation Outcome
// ============================================================================

/// Value form of a mutation outcome, for callers that do not branch on `Result`
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult<T> {
    pub success: bool,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub server_payload: Option<T>,
}

impl<T> MutationResult<T> {
    pub fn from_outcome(outcome: &Result<T>) -> Self
    where
        T: Clone,
    {
        match outcome {
            Ok(payload) => Self {
                success: true,
                error_kind: None,
                error_message: None,
                server_payload: Some(payload.clone()),
            },
            Err(e) => Self {
                success: false,
                error_kind: Some(e.kind().to_string()),
                error_message: Some(e.user_message()),
                server_payload: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(47, 25), 2);
        assert_eq!(total_pages(50, 25), 2);
        assert_eq!(total_pages(51, 25), 3);
        assert_eq!(total_pages(0, 25), 0);
        assert_eq!(total_pages(10, 0), 0);
    }

    #[test]
    fn test_page_meta_wire_names() {
        let meta: PageMeta = serde_json::from_value(serde_json::json!({
            "page": 2, "limit": 25, "total": 47, "totalPages": 2
        })).unwrap();
        assert_eq!(meta, PageMeta::from_total(2, 25, 47));

        let partial: PageMeta = serde_json::from_value(serde_json::json!({"total": 5})).unwrap();
        assert_eq!(partial.page, 1);
        assert_eq!(partial.limit, 20);
    }

    #[test]
    fn test_wire_page_meta_fills_gaps_from_query() {
        let query = ListQuery::new(25);

        let partial: WirePageMeta = serde_json::from_value(serde_json::json!({"total": 47})).unwrap();
        assert_eq!(partial.resolve(&query, 25), PageMeta::from_total(1, 25, 47));

        let inconsistent: WirePageMeta = serde_json::from_value(serde_json::json!({
            "page": 2, "limit": 10, "total": 47, "totalPages": 0
        })).unwrap();
        assert_eq!(inconsistent.resolve(&query, 10).total_pages, 5);

        let no_total: WirePageMeta = serde_json::from_value(serde_json::json!({"page": 3})).unwrap();
        assert_eq!(no_total.resolve(&query, 4), PageMeta::from_total(3, 25, 4));
    }

    #[test]
    fn test_query_pairs_omit_empty_search() {
        let mut query = ListQuery::new(25);
        assert_eq!(query.to_query_pairs().len(), 2);

        query.search = "steam".to_string();
        let pairs = query.to_query_pairs();
        assert!(pairs.contains(&("search".to_string(), "steam".to_string())));
    }

    #[test]
    fn test_entity_id_from_json() {
        assert_eq!(EntityId::from_json(&serde_json::json!(7)), Some(EntityId::Number(7)));
        assert_eq!(EntityId::from_json(&serde_json::json!("a1")), Some(EntityId::from("a1")));
        assert_eq!(EntityId::from_json(&serde_json::json!(null)), None);
        assert_eq!(serde_json::json!({"id": 3}).id(), EntityId::Number(3));
        assert_eq!(EntityId::Number(42).to_string(), "42");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SyncError::validation("bad").kind(), "ValidationError");
        assert_eq!(SyncError::network("down").kind(), "NetworkError");
        let server = SyncError::server(422, "Email already taken");
        assert_eq!(server.kind(), "ServerError");
        assert_eq!(server.user_message(), "Email already taken");
    }

    #[test]
    fn test_mutation_result_from_outcome() {
        let ok: Result<u32> = Ok(5);
        let result = MutationResult::from_outcome(&ok);
        assert!(result.success);
        assert_eq!(result.server_payload, Some(5));

        let err: Result<u32> = Err(SyncError::network("timeout"));
        let result = MutationResult::from_outcome(&err);
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("NetworkError"));
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notification::success("Saved", "ok"));
        notifier.notify(Notification::error("Failed", "nope"));
        assert_eq!(notifier.notifications().len(), 2);
        assert_eq!(notifier.errors().len(), 1);
        notifier.clear();
        assert!(notifier.notifications().is_empty());
    }
}
