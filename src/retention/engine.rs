//! Age- and size-based article cleanup.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use super::store::ArticleStore;
use crate::article::ReadFilter;
use crate::settings::SchedulerSettings;

/// Fraction of the size limit the size pass shrinks the store to.
pub const SIZE_TARGET_RATIO: f64 = 0.95;

/// Default number of articles deleted per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Read articles older than this are removed by the layered age cleanup.
pub const READ_RETENTION_DAYS: i64 = 14;

/// Unread articles older than this are removed by the layered age cleanup.
pub const UNREAD_RETENTION_DAYS: i64 = 60;

/// Outer bound for unread articles, applied before [`UNREAD_RETENTION_DAYS`].
pub const UNREAD_MAX_RETENTION_DAYS: i64 = 90;

/// Limits a cleanup run enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum article age in days; 0 disables age-based deletion.
    pub max_article_age_days: u32,
    /// Maximum store size in megabytes; 0 disables size-based deletion.
    pub max_cache_size_mb: u64,
}

impl From<&SchedulerSettings> for RetentionPolicy {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            max_article_age_days: settings.max_article_age_days,
            max_cache_size_mb: settings.max_cache_size_mb,
        }
    }
}

/// Size figures for one size pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionTarget {
    pub current_size_mb: f64,
    pub limit_mb: f64,
    pub target_size_mb: f64,
}

impl RetentionTarget {
    pub fn new(current_size_mb: f64, limit_mb: u64) -> Self {
        let limit_mb = limit_mb as f64;
        Self {
            current_size_mb,
            limit_mb,
            target_size_mb: limit_mb * SIZE_TARGET_RATIO,
        }
    }

    /// Whether the size pass has work to do.
    pub fn is_over_limit(&self) -> bool {
        self.current_size_mb > self.limit_mb
    }

    /// Whether `size_mb` satisfies the target.
    pub fn is_reached(&self, size_mb: f64) -> bool {
        size_mb <= self.target_size_mb
    }
}

/// What a cleanup run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    /// Deleted by the age pass.
    pub age_deleted: u64,
    /// Deleted by the layered age cleanup.
    pub layered_deleted: u64,
    /// Deleted by the size pass.
    pub size_deleted: u64,
    /// Whether storage was compacted afterwards.
    pub compacted: bool,
    /// Store size after the run, if it could be measured.
    pub final_size_mb: Option<f64>,
    /// Errors that aborted a layer.
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> u64 {
        self.age_deleted + self.layered_deleted + self.size_deleted
    }

    fn record_error(&mut self, layer: &str, message: impl std::fmt::Display) {
        error!("Cleanup layer '{}' aborted: {}", layer, message);
        self.errors.push(format!("{layer}: {message}"));
    }
}

/// Deletes the lowest-value articles first until the store is within its
/// age and size limits.
///
/// Favorite and read-later articles are never deleted: every statement the
/// engine issues goes through [`ArticleStore`], whose deletes exclude them.
/// Failures abort the current layer only and are collected in the report.
pub struct RetentionEngine {
    store: Arc<dyn ArticleStore>,
    batch_size: usize,
}

impl RetentionEngine {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of articles deleted per size-pass batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run the age pass, the layered age cleanup and the size pass, then
    /// compact if anything was deleted.
    pub async fn run(&self, policy: RetentionPolicy, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();

        if policy.max_article_age_days > 0 {
            let deleted = self
                .cleanup_by_age(policy.max_article_age_days, now, &mut report)
                .await;
            report.age_deleted = deleted;
        }

        let deleted = self
            .cleanup_by_age_layers(policy.max_article_age_days, now, &mut report)
            .await;
        report.layered_deleted = deleted;

        if policy.max_cache_size_mb > 0 {
            let deleted = self
                .cleanup_by_size(policy.max_cache_size_mb, &mut report)
                .await;
            report.size_deleted = deleted;
        }

        if report.total_deleted() > 0 {
            match self.store.compact().await {
                Ok(()) => report.compacted = true,
                Err(e) => report.record_error("compact", e),
            }
        }

        report.final_size_mb = self.store.size_mb().await.ok();

        if report.total_deleted() > 0 {
            info!(
                "Cleanup removed {} article(s) (age: {}, layered: {}, size: {})",
                report.total_deleted(),
                report.age_deleted,
                report.layered_deleted,
                report.size_deleted
            );
        } else {
            debug!("Cleanup found nothing to remove");
        }

        report
    }

    /// Delete every unprotected article older than `max_age_days`,
    /// read or unread.
    pub async fn cleanup_by_age(
        &self,
        max_age_days: u32,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> u64 {
        let cutoff = now - Duration::days(i64::from(max_age_days));
        match self
            .store
            .delete_published_before(cutoff, ReadFilter::Any)
            .await
        {
            Ok(deleted) => {
                debug!("Age pass deleted {} article(s) older than {}", deleted, cutoff);
                deleted
            }
            Err(e) => {
                report.record_error("age", e);
                0
            }
        }
    }

    /// Apply widening cutoffs that remove read articles sooner than unread
    /// ones: read past `max_age_days`, read past 14 days, unread past 90
    /// days, then unread past 60 days.
    ///
    /// The first layer is skipped when `max_age_days` is 0.
    pub async fn cleanup_by_age_layers(
        &self,
        max_age_days: u32,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> u64 {
        let mut layers = Vec::with_capacity(4);
        if max_age_days > 0 {
            layers.push(("read-max-age", ReadFilter::ReadOnly, i64::from(max_age_days)));
        }
        layers.push(("read-stale", ReadFilter::ReadOnly, READ_RETENTION_DAYS));
        layers.push(("unread-max", ReadFilter::UnreadOnly, UNREAD_MAX_RETENTION_DAYS));
        layers.push(("unread-stale", ReadFilter::UnreadOnly, UNREAD_RETENTION_DAYS));

        let mut total = 0;
        for (layer, filter, days) in layers {
            let cutoff = now - Duration::days(days);
            match self.store.delete_published_before(cutoff, filter).await {
                Ok(deleted) => {
                    if deleted > 0 {
                        debug!("Layer '{}' deleted {} article(s)", layer, deleted);
                    }
                    total += deleted;
                }
                Err(e) => report.record_error(layer, e),
            }
        }
        total
    }

    /// Shrink the store to 95% of `limit_mb` if it exceeds the limit.
    ///
    /// Read articles go first, oldest first, in batches; the size is
    /// re-measured after every batch. Only when no read candidates remain
    /// are unread articles considered.
    pub async fn cleanup_by_size(&self, limit_mb: u64, report: &mut CleanupReport) -> u64 {
        let current = match self.store.size_mb().await {
            Ok(size) => size,
            Err(e) => {
                report.record_error("size", e);
                return 0;
            }
        };

        let target = RetentionTarget::new(current, limit_mb);
        if !target.is_over_limit() {
            return 0;
        }

        info!(
            "Store is {:.1} MB, over the {} MB limit; shrinking to {:.1} MB",
            target.current_size_mb, limit_mb, target.target_size_mb
        );

        let mut size = current;
        let mut total = 0;

        for (layer, filter) in [("size-read", ReadFilter::ReadOnly), ("size-any", ReadFilter::Any)] {
            while !target.is_reached(size) {
                let deleted = match self.store.delete_oldest(filter, self.batch_size).await {
                    Ok(deleted) => deleted,
                    Err(e) => {
                        report.record_error(layer, e);
                        break;
                    }
                };
                if deleted == 0 {
                    debug!("Layer '{}' has no candidates left", layer);
                    break;
                }
                total += deleted;

                size = match self.store.size_mb().await {
                    Ok(size) => size,
                    Err(e) => {
                        report.record_error(layer, e);
                        break;
                    }
                };
                debug!(
                    "Layer '{}' deleted {} article(s), size now {:.1} MB",
                    layer, deleted, size
                );
            }

            if target.is_reached(size) {
                break;
            }
        }

        if !target.is_reached(size) {
            info!(
                "Size target not reached ({:.1} MB > {:.1} MB); remaining articles are protected",
                size, target.target_size_mb
            );
        }

        total
    }
}
