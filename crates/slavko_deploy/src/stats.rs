//! Deployment stat records.
//!
//! A stat is derived from every terminal DEPLOY report on the bus,
//! whether or not this process initiated the attempt. The collection is
//! append-only and newest-first; only a CLEANUP/DONE message clears it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

use slavko_store::{keys, KvStore, KvStoreExt};

/// Outcome recorded on a stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatStatus {
    Success,
    Failed,
}

/// Derived, persisted summary of one completed deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentStat {
    /// Unique stat ID.
    pub id: String,
    /// Project the attempt deployed.
    pub project: String,
    /// Whether the attempt succeeded.
    pub status: StatStatus,
    /// Reported duration in seconds; 0 when absent from the report.
    pub duration: f64,
    /// Provider tag; `"unknown"` when absent from the report.
    pub provider: String,
    /// Destination URL, when the report carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Failure detail, when the report carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Instant the stat was derived.
    pub timestamp: DateTime<Utc>,
}

/// Lenient view of a terminal DEPLOY payload.
///
/// Reports come from the model or from external deploy operations, so
/// every field is optional and anything that is not an object decodes to
/// the empty report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportPayload {
    pub project: Option<String>,
    pub duration_sec: Option<f64>,
    pub provider: Option<String>,
    pub deploy_url: Option<String>,
    pub error: Option<String>,
    pub health_check: Option<bool>,
}

impl ReportPayload {
    pub fn from_value(payload: Option<&Value>) -> Self {
        payload
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Whether the report explicitly asks for a follow-up health check.
    pub fn wants_health_check(&self) -> bool {
        self.health_check == Some(true)
    }
}

impl DeploymentStat {
    /// Derive a stat from a terminal report.
    pub fn from_report(succeeded: bool, report: &ReportPayload) -> Self {
        Self {
            id: format!("stat-{}", uuid::Uuid::new_v4()),
            project: report
                .project
                .clone()
                .unwrap_or_else(|| "unknown-project".to_string()),
            status: if succeeded {
                StatStatus::Success
            } else {
                StatStatus::Failed
            },
            duration: report.duration_sec.unwrap_or(0.0),
            provider: report
                .provider
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            url: report.deploy_url.clone(),
            error: report.error.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Newest-first stat collection with load-at-start / save-on-change
/// persistence.
pub struct StatsStore {
    store: Arc<dyn KvStore>,
    stats: Mutex<Vec<DeploymentStat>>,
}

impl StatsStore {
    /// Load the persisted collection, or start empty.
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let stats = match store.load_json::<Vec<DeploymentStat>>(keys::STATS) {
            Ok(Some(stats)) => stats,
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!("failed to load stats, starting empty: {err}");
                Vec::new()
            }
        };
        Self {
            store,
            stats: Mutex::new(stats),
        }
    }

    /// Prepend a stat and persist the whole collection.
    pub fn record(&self, stat: DeploymentStat) {
        let mut stats = self.stats.lock().expect("stats lock");
        stats.insert(0, stat);
        self.persist(&stats);
    }

    /// Clear the whole collection unconditionally. Idempotent.
    pub fn clear(&self) {
        let mut stats = self.stats.lock().expect("stats lock");
        stats.clear();
        self.persist(&stats);
    }

    /// Copy of the collection, newest first.
    pub fn snapshot(&self) -> Vec<DeploymentStat> {
        self.stats.lock().expect("stats lock").clone()
    }

    pub fn len(&self) -> usize {
        self.stats.lock().expect("stats lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, stats: &[DeploymentStat]) {
        if let Err(err) = self.store.save_json(keys::STATS, &stats) {
            tracing::warn!("failed to persist stats: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slavko_store::MemoryStore;

    fn report(value: Value) -> ReportPayload {
        ReportPayload::from_value(Some(&value))
    }

    #[test]
    fn test_stat_defaults() {
        let stat = DeploymentStat::from_report(true, &ReportPayload::default());
        assert_eq!(stat.project, "unknown-project");
        assert_eq!(stat.provider, "unknown");
        assert_eq!(stat.duration, 0.0);
        assert_eq!(stat.status, StatStatus::Success);
        assert_eq!(stat.url, None);
        assert_eq!(stat.error, None);
    }

    #[test]
    fn test_report_payload_fields() {
        let payload = report(json!({
            "project": "site",
            "durationSec": 12,
            "provider": "vercel",
            "deployUrl": "https://x",
            "healthCheck": true,
        }));
        assert_eq!(payload.project.as_deref(), Some("site"));
        assert_eq!(payload.duration_sec, Some(12.0));
        assert_eq!(payload.deploy_url.as_deref(), Some("https://x"));
        assert!(payload.wants_health_check());

        let stat = DeploymentStat::from_report(true, &payload);
        assert_eq!(stat.duration, 12.0);
        assert_eq!(stat.provider, "vercel");
        assert_eq!(stat.url.as_deref(), Some("https://x"));
    }

    #[test]
    fn test_non_object_payload_is_empty_report() {
        let payload = report(json!("all done"));
        assert_eq!(payload.project, None);
        assert!(!payload.wants_health_check());
        assert!(!ReportPayload::from_value(None).wants_health_check());
    }

    #[test]
    fn test_store_is_newest_first_and_persists() {
        let kv = Arc::new(MemoryStore::new());
        let stats = StatsStore::load(Arc::clone(&kv) as Arc<dyn KvStore>);

        stats.record(DeploymentStat::from_report(true, &report(json!({"project": "a"}))));
        stats.record(DeploymentStat::from_report(false, &report(json!({"project": "b"}))));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot[0].project, "b");
        assert_eq!(snapshot[1].project, "a");

        // A second store over the same backing sees the saved collection.
        let reloaded = StatsStore::load(kv as Arc<dyn KvStore>);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.snapshot()[0].project, "b");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let kv = Arc::new(MemoryStore::new());
        let stats = StatsStore::load(kv as Arc<dyn KvStore>);
        stats.record(DeploymentStat::from_report(true, &ReportPayload::default()));
        assert!(!stats.is_empty());

        stats.clear();
        assert!(stats.is_empty());
        stats.clear();
        assert!(stats.is_empty());
    }
}
