use super::plan::DeletionPlan;
use crate::config::CleanupConfig;
use crate::retry::{Exhausted, Retried, retry};
use crate::storage::{ObjectStorage, StorageError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

/// What happened to one object key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PurgeOutcome {
    /// The object was removed and confirmed gone
    Deleted { attempts: u32 },
    /// The object was not in the bucket to begin with
    AlreadyAbsent,
    /// Every attempt failed; the object may still exist
    Failed { attempts: u32, reason: String },
}

impl PurgeOutcome {
    fn label(&self) -> &'static str {
        match self {
            PurgeOutcome::Deleted { .. } => "deleted",
            PurgeOutcome::AlreadyAbsent => "already_absent",
            PurgeOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct KeyOutcome {
    pub key: String,
    #[serde(flatten)]
    pub outcome: PurgeOutcome,
}

/// Result of purging a plan. Failures are reported here, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PurgeReport {
    pub outcomes: Vec<KeyOutcome>,
    pub deleted: usize,
    pub already_absent: usize,
    pub failed: usize,
    /// URLs the plan skipped because they were not bucket objects
    pub skipped_urls: usize,
}

impl PurgeReport {
    fn record(&mut self, key: String, outcome: PurgeOutcome) {
        match outcome {
            PurgeOutcome::Deleted { .. } => self.deleted += 1,
            PurgeOutcome::AlreadyAbsent => self.already_absent += 1,
            PurgeOutcome::Failed { .. } => self.failed += 1,
        }
        metrics::counter!("atelier_image_deletions_total", "outcome" => outcome.label()).increment(1);
        self.outcomes.push(KeyOutcome { key, outcome });
    }
}

/// Why a single deletion attempt did not succeed
#[derive(Error, Debug)]
enum AttemptError {
    #[error("remove failed: {0}")]
    Remove(StorageError),
    #[error("verification listing failed: {0}")]
    Verify(StorageError),
    #[error("object still present after removal")]
    StillPresent,
}

/// Deletes objects one at a time, confirming each deletion by listing the bucket afterwards.
pub struct ImagePurger {
    storage: Arc<dyn ObjectStorage>,
    config: CleanupConfig,
}

impl ImagePurger {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: CleanupConfig) -> Self {
        Self { storage, config }
    }

    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }

    /// Delete every key in the plan, sequentially.
    #[instrument(skip(self, plan), fields(keys = plan.keys.len()))]
    pub async fn purge(&self, plan: &DeletionPlan) -> PurgeReport {
        let mut report = PurgeReport {
            skipped_urls: plan.skipped_urls,
            ..Default::default()
        };

        for (index, key) in plan.keys.iter().enumerate() {
            if index > 0 && !self.config.pause_between_objects.is_zero() {
                tokio::time::sleep(self.config.pause_between_objects).await;
            }
            let outcome = self.purge_key(key).await;
            report.record(key.clone(), outcome);
        }

        info!(
            deleted = report.deleted,
            already_absent = report.already_absent,
            failed = report.failed,
            "Image purge finished"
        );
        report
    }

    async fn purge_key(&self, key: &str) -> PurgeOutcome {
        match self.storage.exists(key).await {
            Ok(false) => {
                debug!("Object {} already absent", key);
                return PurgeOutcome::AlreadyAbsent;
            }
            Ok(true) => {}
            Err(e) => warn!("Could not check whether {} exists, deleting anyway: {}", key, e),
        }

        match retry(&self.config.retry, |_| self.delete_and_verify(key)).await {
            Ok(Retried { attempts, .. }) => {
                debug!("Deleted {} after {} attempt(s)", key, attempts);
                PurgeOutcome::Deleted { attempts }
            }
            Err(Exhausted { attempts, last_error }) => {
                warn!("Giving up on {} after {} attempts: {}", key, attempts, last_error);
                PurgeOutcome::Failed {
                    attempts,
                    reason: last_error.to_string(),
                }
            }
        }
    }

    async fn delete_and_verify(&self, key: &str) -> Result<(), AttemptError> {
        self.storage.remove(key).await.map_err(AttemptError::Remove)?;
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        match self.storage.exists(key).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(AttemptError::StillPresent),
            Err(e) => Err(AttemptError::Verify(e)),
        }
    }
}
