//! Recompute and apply the full desired permission state for a category.
//!
//! Every run derives visibility from `now`, the window table and the live
//! channel listing alone. Overwrites are written unconditionally; nothing is
//! diffed against what the directory currently holds.

use crate::allowed::AccessPlan;
use crate::config::Config;
use crate::directory::{Category, Directory, DirectoryError, Overwrite};
use crate::ensure::{ensure_in, recognize, Bucket, EnsureOutcome};
use crate::error::{GateError, Result};
use crate::period::PeriodKey;
use crate::report::{ReconciliationReport, WriteFailure, WriteTarget};
use crate::window::WindowTable;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

struct WriteJob {
    bucket: String,
    channel_id: String,
    target: WriteTarget,
    overwrite: Overwrite,
}

pub struct Reconciler {
    category_id: String,
    table: WindowTable,
    directory: Arc<dyn Directory>,
    max_concurrent_writes: usize,
}

impl Reconciler {
    pub fn new(config: &Config, directory: Arc<dyn Directory>) -> Result<Self> {
        Ok(Self {
            category_id: config.category_id.clone(),
            table: WindowTable::from_config(config)?,
            directory,
            max_concurrent_writes: config.sync.max_concurrent_writes.max(1),
        })
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn table(&self) -> &WindowTable {
        &self.table
    }

    pub fn plan(&self, now: DateTime<Utc>) -> AccessPlan {
        self.table.plan(now)
    }

    async fn resolve_category(&self) -> Result<Category> {
        match self.directory.fetch_category(&self.category_id).await {
            Ok(Some(category)) => Ok(category),
            Ok(None) => Err(GateError::CategoryNotFound(self.category_id.clone())),
            Err(source) => Err(self.resolution(source)),
        }
    }

    fn resolution(&self, source: DirectoryError) -> GateError {
        GateError::Resolution {
            category: self.category_id.clone(),
            source,
        }
    }

    async fn list_buckets(&self) -> Result<(Vec<Bucket>, usize)> {
        let children = self
            .directory
            .list_children(&self.category_id)
            .await
            .map_err(|e| self.resolution(e))?;
        Ok(recognize(&self.category_id, &children))
    }

    /// Make sure the bucket for the month of `now` exists, creating it once
    /// if absent. Fails without side effects if the category is missing.
    pub async fn ensure_current_bucket(&self, now: DateTime<Utc>) -> Result<EnsureOutcome> {
        self.resolve_category().await?;
        let (buckets, _) = self.list_buckets().await?;
        let period = PeriodKey::of(now);
        ensure_in(self.directory.as_ref(), &self.category_id, &buckets, period)
            .await
            .map_err(|source| GateError::CreateBucket {
                bucket: period.channel_name(),
                source,
            })
    }

    /// Run a full reconciliation for `now`.
    ///
    /// Errors only when the category cannot be resolved or listed, before any
    /// write. Failures of individual writes are collected in the report.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<ReconciliationReport> {
        let started_at = Utc::now();
        let period = PeriodKey::of(now);
        let plan = self.table.plan(now);
        info!(category = %self.category_id, %period, "reconciliation started");

        let category = match self.resolve_category().await {
            Ok(c) => c,
            Err(e) => {
                error!(category = %self.category_id, error = %e, "reconciliation aborted");
                return Err(e);
            }
        };
        let (mut buckets, ignored) = match self.list_buckets().await {
            Ok(listing) => listing,
            Err(e) => {
                error!(category = %category.name, error = %e, "reconciliation aborted");
                return Err(e);
            }
        };

        let mut failures = Vec::new();
        let mut writes_attempted = 0;
        let mut created = None;

        // Creation must finish before any overwrite is issued.
        let had_current = buckets.iter().any(|b| b.period == period);
        if !had_current {
            writes_attempted += 1;
        }
        match ensure_in(self.directory.as_ref(), &self.category_id, &buckets, period).await {
            Ok(outcome) if outcome.created => {
                created = Some(outcome.bucket.channel.name.clone());
                buckets.push(outcome.bucket);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(bucket = %period.channel_name(), error = %e, "bucket creation failed");
                failures.push(WriteFailure {
                    bucket: period.channel_name(),
                    target: WriteTarget::Create,
                    error: e.to_string(),
                });
            }
        }

        let jobs = self.write_jobs(&buckets, &plan);
        writes_attempted += jobs.len();

        let directory = self.directory.as_ref();
        let results: Vec<(WriteJob, std::result::Result<(), DirectoryError>)> =
            stream::iter(jobs)
                .map(move |job| async move {
                    let result = directory
                        .set_overwrite(&job.channel_id, job.overwrite.clone())
                        .await;
                    (job, result)
                })
                .buffer_unordered(self.max_concurrent_writes)
                .collect()
                .await;

        for (job, result) in results {
            match result {
                Ok(()) => debug!(
                    bucket = %job.bucket,
                    target = %job.target,
                    view = job.overwrite.view,
                    "overwrite applied"
                ),
                Err(e) => {
                    warn!(bucket = %job.bucket, target = %job.target, error = %e, "overwrite failed");
                    failures.push(WriteFailure {
                        bucket: job.bucket,
                        target: job.target,
                        error: e.to_string(),
                    });
                }
            }
        }
        failures.sort_by(|a, b| {
            a.bucket
                .cmp(&b.bucket)
                .then_with(|| a.target.to_string().cmp(&b.target.to_string()))
        });

        buckets.sort_by_key(|b| b.period);
        let visible: BTreeMap<String, Vec<String>> = plan
            .tiers
            .iter()
            .map(|tier| {
                let names = buckets
                    .iter()
                    .filter(|b| tier.can_view(b.period))
                    .map(|b| b.channel.name.clone())
                    .collect();
                (tier.name.clone(), names)
            })
            .collect();

        let report = ReconciliationReport {
            category_id: self.category_id.clone(),
            period,
            started_at,
            finished_at: Utc::now(),
            created,
            buckets: buckets.iter().map(|b| b.channel.name.clone()).collect(),
            ignored,
            visible,
            writes_attempted,
            writes_failed: failures.len(),
            failures,
        };
        info!(
            category = %category.name,
            %period,
            created = report.buckets_created(),
            buckets = report.buckets.len(),
            ignored,
            writes = report.writes_attempted,
            failed = report.writes_failed,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// One deny for the unprivileged identity plus one decision per tier,
    /// for every bucket.
    fn write_jobs(&self, buckets: &[Bucket], plan: &AccessPlan) -> Vec<WriteJob> {
        let everyone = self.directory.everyone_principal();
        let mut jobs = Vec::with_capacity(buckets.len() * (plan.tiers.len() + 1));
        for bucket in buckets {
            jobs.push(WriteJob {
                bucket: bucket.channel.name.clone(),
                channel_id: bucket.channel.id.clone(),
                target: WriteTarget::Everyone,
                overwrite: Overwrite {
                    principal: everyone.clone(),
                    view: false,
                },
            });
            for tier in &plan.tiers {
                jobs.push(WriteJob {
                    bucket: bucket.channel.name.clone(),
                    channel_id: bucket.channel.id.clone(),
                    target: WriteTarget::Tier(tier.name.clone()),
                    overwrite: Overwrite {
                        principal: tier.principal.clone(),
                        view: tier.can_view(bucket.period),
                    },
                });
            }
        }
        jobs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;
    use crate::memory::{Call, MemoryDirectory};
    use chrono::TimeZone;

    const EVERYONE: &str = "guild";
    const CAT: &str = "cat";

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 0, 0).unwrap()
    }

    fn config(tiers: &[(&str, &str, u32)]) -> Config {
        Config::new(
            CAT,
            tiers
                .iter()
                .map(|(name, role, window)| TierConfig {
                    name: name.to_string(),
                    role_id: role.to_string(),
                    window_months: *window,
                })
                .collect(),
        )
    }

    fn setup(tiers: &[(&str, &str, u32)]) -> (Arc<MemoryDirectory>, Reconciler) {
        let dir = Arc::new(MemoryDirectory::new(EVERYONE));
        dir.add_category(CAT, "Monthly Posts");
        let reconciler = Reconciler::new(&config(tiers), dir.clone()).unwrap();
        (dir, reconciler)
    }

    fn overwrite_calls_for(dir: &MemoryDirectory, channel_id: &str) -> usize {
        dir.calls()
            .iter()
            .filter(|c| matches!(c, Call::SetOverwrite { channel_id: id, .. } if id == channel_id))
            .count()
    }

    #[tokio::test]
    async fn end_to_end_two_tiers() {
        let (dir, rec) = setup(&[("a", "role-a", 0), ("b", "role-b", 1)]);
        dir.add_channel(Some(CAT), "2025-07-posts");
        dir.add_channel(Some(CAT), "2025-08-posts");

        let report = rec.reconcile(at(2025, 8, 15)).await.unwrap();

        assert_eq!(report.created, None);
        assert_eq!(report.buckets, vec!["2025-07-posts", "2025-08-posts"]);
        assert_eq!(report.writes_attempted, 6);
        assert_eq!(report.writes_failed, 0);
        assert!(report.is_clean());

        assert_eq!(dir.view_of("2025-08-posts", "role-a"), Some(true));
        assert_eq!(dir.view_of("2025-07-posts", "role-a"), Some(false));
        assert_eq!(dir.view_of("2025-08-posts", "role-b"), Some(true));
        assert_eq!(dir.view_of("2025-07-posts", "role-b"), Some(true));
        for bucket in ["2025-07-posts", "2025-08-posts"] {
            assert_eq!(dir.view_of(bucket, EVERYONE), Some(false));
        }
        assert_eq!(report.visible["a"], vec!["2025-08-posts"]);
        assert_eq!(report.visible["b"], vec!["2025-07-posts", "2025-08-posts"]);
    }

    #[tokio::test]
    async fn creates_missing_current_bucket_then_permissions_it() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);
        dir.add_channel(Some(CAT), "2025-07-posts");

        let report = rec.reconcile(at(2025, 8, 1)).await.unwrap();

        assert_eq!(report.created.as_deref(), Some("2025-08-posts"));
        assert_eq!(report.buckets_created(), 1);
        // create + 2 buckets × (everyone + a)
        assert_eq!(report.writes_attempted, 5);
        assert_eq!(dir.view_of("2025-08-posts", "role-a"), Some(true));
        assert_eq!(dir.view_of("2025-08-posts", EVERYONE), Some(false));

        let calls = dir.calls();
        let create_at = calls
            .iter()
            .position(|c| matches!(c, Call::CreateChannel { .. }))
            .unwrap();
        let first_write = calls
            .iter()
            .position(|c| matches!(c, Call::SetOverwrite { .. }))
            .unwrap();
        assert!(create_at < first_write, "writes must follow creation");
    }

    #[tokio::test]
    async fn ensure_is_idempotent_within_a_period() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);

        let first = rec.ensure_current_bucket(at(2025, 8, 2)).await.unwrap();
        let second = rec.ensure_current_bucket(at(2025, 8, 28)).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.bucket.channel.id, second.bucket.channel.id);
        assert_eq!(dir.channels_named("2025-08-posts").len(), 1);
        let creates = dir
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateChannel { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn repeated_reconcile_creates_once() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);
        rec.reconcile(at(2025, 8, 2)).await.unwrap();
        let again = rec.reconcile(at(2025, 8, 3)).await.unwrap();
        assert_eq!(again.created, None);
        assert_eq!(dir.channels_named("2025-08-posts").len(), 1);
    }

    #[tokio::test]
    async fn foreign_channels_are_never_touched() {
        let (dir, rec) = setup(&[("a", "role-a", 3)]);
        let rules = dir.add_channel(Some(CAT), "rules");
        let lookalike = dir.add_channel(Some(CAT), "2025-08-posts-archive");
        let elsewhere = dir.add_channel(Some("other-cat"), "2025-07-posts");
        dir.add_channel(Some(CAT), "2025-08-posts");

        let report = rec.reconcile(at(2025, 8, 15)).await.unwrap();

        assert_eq!(report.ignored, 2);
        assert_eq!(report.buckets, vec!["2025-08-posts"]);
        for id in [&rules, &lookalike, &elsewhere] {
            assert_eq!(overwrite_calls_for(&dir, id), 0);
        }
        assert_eq!(dir.view_of("rules", "role-a"), None);
    }

    #[tokio::test]
    async fn default_deny_for_tiers_outside_window() {
        let (dir, rec) = setup(&[("a", "role-a", 0), ("b", "role-b", 1), ("c", "role-c", 12)]);
        for name in ["2024-06-posts", "2025-01-posts", "2025-02-posts"] {
            dir.add_channel(Some(CAT), name);
        }

        rec.reconcile(at(2025, 2, 10)).await.unwrap();

        assert_eq!(dir.view_of("2024-06-posts", "role-a"), Some(false));
        assert_eq!(dir.view_of("2024-06-posts", "role-b"), Some(false));
        assert_eq!(dir.view_of("2024-06-posts", "role-c"), Some(false));
        assert_eq!(dir.view_of("2025-01-posts", "role-a"), Some(false));
        assert_eq!(dir.view_of("2025-01-posts", "role-b"), Some(true));
        assert_eq!(dir.view_of("2025-01-posts", "role-c"), Some(true));
        assert_eq!(dir.view_of("2024-06-posts", EVERYONE), Some(false));
    }

    #[tokio::test]
    async fn future_buckets_are_denied_to_everyone() {
        let (dir, rec) = setup(&[("a", "role-a", 24)]);
        dir.add_channel(Some(CAT), "2025-09-posts");
        rec.reconcile(at(2025, 8, 15)).await.unwrap();
        assert_eq!(dir.view_of("2025-09-posts", "role-a"), Some(false));
    }

    #[tokio::test]
    async fn cross_year_window() {
        let (dir, rec) = setup(&[("a", "role-a", 1)]);
        dir.add_channel(Some(CAT), "2024-11-posts");
        dir.add_channel(Some(CAT), "2024-12-posts");

        let report = rec.reconcile(at(2025, 1, 10)).await.unwrap();

        assert_eq!(report.created.as_deref(), Some("2025-01-posts"));
        assert_eq!(dir.view_of("2025-01-posts", "role-a"), Some(true));
        assert_eq!(dir.view_of("2024-12-posts", "role-a"), Some(true));
        assert_eq!(dir.view_of("2024-11-posts", "role-a"), Some(false));
    }

    #[tokio::test]
    async fn result_ignores_prior_permission_state() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);
        dir.add_channel(Some(CAT), "2025-07-posts");
        dir.add_channel(Some(CAT), "2025-08-posts");

        rec.reconcile(at(2025, 7, 20)).await.unwrap();
        assert_eq!(dir.view_of("2025-07-posts", "role-a"), Some(true));

        rec.reconcile(at(2025, 8, 20)).await.unwrap();
        assert_eq!(dir.view_of("2025-07-posts", "role-a"), Some(false));
        assert_eq!(dir.view_of("2025-08-posts", "role-a"), Some(true));
    }

    #[tokio::test]
    async fn partial_failure_is_collected() {
        let (dir, rec) = setup(&[("a", "role-a", 0), ("b", "role-b", 1)]);
        dir.add_channel(Some(CAT), "2025-07-posts");
        dir.add_channel(Some(CAT), "2025-08-posts");
        dir.fail_overwrite_once("2025-08-posts", "role-b");

        let report = rec.reconcile(at(2025, 8, 15)).await.unwrap();

        assert_eq!(report.writes_attempted, 6);
        assert_eq!(report.writes_failed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].bucket, "2025-08-posts");
        assert_eq!(report.failures[0].target, WriteTarget::Tier("b".into()));
        assert_eq!(dir.view_of("2025-07-posts", "role-b"), Some(true));
        assert_eq!(dir.view_of("2025-08-posts", "role-a"), Some(true));
        assert_eq!(dir.view_of("2025-08-posts", "role-b"), None);

        // The next run heals the missed pair.
        let healed = rec.reconcile(at(2025, 8, 16)).await.unwrap();
        assert!(healed.is_clean());
        assert_eq!(dir.view_of("2025-08-posts", "role-b"), Some(true));
    }

    #[tokio::test]
    async fn failed_create_still_reconciles_existing_buckets() {
        let (dir, rec) = setup(&[("a", "role-a", 1)]);
        dir.add_channel(Some(CAT), "2025-07-posts");
        dir.fail_next_create();

        let report = rec.reconcile(at(2025, 8, 15)).await.unwrap();

        assert_eq!(report.created, None);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, WriteTarget::Create);
        assert_eq!(report.failures[0].bucket, "2025-08-posts");
        // create + everyone + a on the July bucket
        assert_eq!(report.writes_attempted, 3);
        assert_eq!(dir.view_of("2025-07-posts", "role-a"), Some(true));
    }

    #[tokio::test]
    async fn missing_category_aborts_before_any_write() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);
        dir.add_channel(Some(CAT), "2025-07-posts");
        dir.remove_category(CAT);

        let err = rec.reconcile(at(2025, 8, 15)).await.unwrap_err();

        assert!(matches!(err, GateError::CategoryNotFound(ref id) if id == CAT));
        assert_eq!(dir.calls(), vec![Call::FetchCategory(CAT.to_string())]);

        let err = rec.ensure_current_bucket(at(2025, 8, 15)).await.unwrap_err();
        assert!(matches!(err, GateError::CategoryNotFound(_)));
        assert!(dir.channels_named("2025-08-posts").is_empty());
    }

    #[tokio::test]
    async fn failed_create_is_not_a_resolution_error() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);
        dir.fail_next_create();

        let err = rec.ensure_current_bucket(at(2025, 8, 15)).await.unwrap_err();

        assert!(
            matches!(err, GateError::CreateBucket { ref bucket, .. } if bucket == "2025-08-posts"),
            "{err:?}"
        );
        assert!(!err.is_configuration());
        assert!(dir.channels_named("2025-08-posts").is_empty());

        let outcome = rec.ensure_current_bucket(at(2025, 8, 15)).await.unwrap();
        assert!(outcome.created);
    }

    #[tokio::test]
    async fn listing_failure_aborts_as_resolution_error() {
        let (dir, rec) = setup(&[("a", "role-a", 0)]);
        dir.fail_listing(true);

        let err = rec.reconcile(at(2025, 8, 15)).await.unwrap_err();

        assert!(matches!(err, GateError::Resolution { .. }));
        assert!(!dir
            .calls()
            .iter()
            .any(|c| matches!(c, Call::CreateChannel { .. } | Call::SetOverwrite { .. })));
    }

    #[tokio::test]
    async fn bounded_concurrency_still_writes_everything() {
        let dir = Arc::new(MemoryDirectory::new(EVERYONE));
        dir.add_category(CAT, "Monthly Posts");
        let mut cfg = config(&[("a", "role-a", 2), ("b", "role-b", 5)]);
        cfg.sync.max_concurrent_writes = 1;
        let rec = Reconciler::new(&cfg, dir.clone()).unwrap();
        for name in ["2025-03-posts", "2025-04-posts", "2025-05-posts", "2025-06-posts"] {
            dir.add_channel(Some(CAT), name);
        }

        let report = rec.reconcile(at(2025, 6, 1)).await.unwrap();

        assert_eq!(report.writes_attempted, 12);
        assert_eq!(dir.view_of("2025-03-posts", "role-a"), Some(false));
        assert_eq!(dir.view_of("2025-04-posts", "role-a"), Some(true));
        assert_eq!(dir.view_of("2025-03-posts", "role-b"), Some(true));
    }
}
