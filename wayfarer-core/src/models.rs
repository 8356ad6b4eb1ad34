//! Data models for session storage and the REST layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A browser session: one anonymous user's character data and UI
/// preferences, keyed by a client-generated uuid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub uuid: String,
    pub character_config: Value,
    pub ui_config: Value,
    pub last_updated: DateTime<Utc>,
}

/// A saved gear set belonging to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GearSetRecord {
    pub id: String,
    pub session_uuid: String,
    pub name: String,
    /// Slot assignment as stored, slot name to item reference.
    pub slots: Value,
    pub export_string: Option<String>,
    /// Set when the optimizer produced this set rather than the user.
    pub is_optimized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-submitted bug report. The reporter's session is duplicated
/// into a frozen snapshot session so reviewers see the state as it was
/// at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugReport {
    pub id: String,
    pub original_session_uuid: String,
    pub snapshot_session_uuid: String,
    pub description: String,
    pub app_version: Option<String>,
    pub browser_info: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub screenshots: Vec<String>,
    pub reviewed: bool,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub notes: Option<String>,
}

/// One API access record for the audit log.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub session_uuid: String,
    pub endpoint: String,
    pub method: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// A stored audit row, as returned by per-session history queries.
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub endpoint: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Aggregated API usage over a recent window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiStats {
    pub total_requests: u64,
    pub unique_sessions: u64,
    /// Endpoint to request count, busiest first.
    pub requests_by_endpoint: Vec<(String, u64)>,
    /// Day (YYYY-MM-DD) to request count, oldest first.
    pub requests_by_day: Vec<(String, u64)>,
    /// Ten most active sessions with their request counts.
    pub top_sessions: Vec<(String, u64)>,
}
