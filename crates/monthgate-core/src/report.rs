use crate::period::PeriodKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a run was doing when an external call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tier", rename_all = "snake_case")]
pub enum WriteTarget {
    /// Creating the bucket itself.
    Create,
    /// The default-deny baseline for the unprivileged identity.
    Everyone,
    /// The visibility decision for a named tier.
    Tier(String),
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Create => f.write_str("create"),
            WriteTarget::Everyone => f.write_str("@everyone"),
            WriteTarget::Tier(name) => write!(f, "tier {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub bucket: String,
    pub target: WriteTarget,
    pub error: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub category_id: String,
    pub period: PeriodKey,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Name of the bucket created this run, if any.
    pub created: Option<String>,
    /// Recognized buckets, oldest first.
    pub buckets: Vec<String>,
    /// Children of the category that were not recognized and left alone.
    pub ignored: usize,
    /// Buckets each tier can see after this run.
    pub visible: BTreeMap<String, Vec<String>>,
    pub writes_attempted: usize,
    pub writes_failed: usize,
    pub failures: Vec<WriteFailure>,
}

impl ReconciliationReport {
    pub fn buckets_created(&self) -> usize {
        usize::from(self.created.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line human summary, used as the reply to manual triggers.
    pub fn summary(&self) -> String {
        let created = match &self.created {
            Some(name) => format!("created {name}"),
            None => "no bucket created".to_string(),
        };
        format!(
            "{}: {created}, {} buckets, {}/{} writes failed",
            self.period,
            self.buckets.len(),
            self.writes_failed,
            self.writes_attempted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_target_serializes_tagged() {
        let json = serde_json::to_value(WriteTarget::Tier("galaxy".into())).unwrap();
        assert_eq!(json["kind"], "tier");
        assert_eq!(json["tier"], "galaxy");
        let json = serde_json::to_value(WriteTarget::Everyone).unwrap();
        assert_eq!(json["kind"], "everyone");
    }

    #[test]
    fn summary_mentions_counts() {
        let now = Utc::now();
        let report = ReconciliationReport {
            category_id: "111".into(),
            period: "2025-08".parse().unwrap(),
            started_at: now,
            finished_at: now,
            created: Some("2025-08-posts".into()),
            buckets: vec!["2025-07-posts".into(), "2025-08-posts".into()],
            ignored: 1,
            visible: BTreeMap::new(),
            writes_attempted: 6,
            writes_failed: 1,
            failures: vec![],
        };
        assert_eq!(report.buckets_created(), 1);
        assert_eq!(
            report.summary(),
            "2025-08: created 2025-08-posts, 2 buckets, 1/6 writes failed"
        );
    }
}
