//! # Email Queue Worker
//!
//! The single consumer of one region's outbound email queue.
//!
//! ## Loop contract
//!
//! 1. Poll every `EMAIL_POLL_INTERVAL` (30s prod, 5s CI).
//! 2. Claim up to `EMAIL_BATCH_SIZE` eligible rows (`FOR UPDATE SKIP
//!    LOCKED` selection; rows stay `pending` in the store so a crash
//!    retries them).
//! 3. Send each claimed row over SMTP, append an attempt record, then
//!    mark `sent` - or leave `pending` for the backoff schedule, or mark
//!    `failed` once attempts are exhausted.
//! 4. On shutdown, finish the in-flight send, then exit without claiming
//!    more.
//!
//! Exactly one of these runs per region - a deployment contract
//! (`replicas: 1`, `strategy: Recreate`), not a lock. The claim sizes are
//! logged so a misdeployed second replica shows up in the logs as
//! interleaved claims.

use crate::config::EmailWorkerConfig;
use crate::email::mailer::Mailer;
use crate::email::queue::EmailQueue;
use crate::email::{EmailStatus, QueuedEmail};
use crate::errors::ApiError;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// What happened to one claimed row after a delivery attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Sent,
    /// Stays pending; the backoff schedule gates the next try.
    RetryLater,
    /// Attempts exhausted.
    Failed,
}

/// Decides a row's fate after an attempt. `attempts_done` counts the
/// attempt that just finished.
pub fn outcome_after_attempt(
    send_succeeded: bool,
    attempts_done: i32,
    max_attempts: i32,
) -> AttemptOutcome {
    if send_succeeded {
        AttemptOutcome::Sent
    } else if attempts_done >= max_attempts {
        AttemptOutcome::Failed
    } else {
        AttemptOutcome::RetryLater
    }
}

/// The worker loop over one queue.
pub struct EmailWorker {
    queue: EmailQueue,
    mailer: Arc<dyn Mailer>,
    config: EmailWorkerConfig,
}

impl EmailWorker {
    pub fn new(queue: EmailQueue, mailer: Arc<dyn Mailer>, config: EmailWorkerConfig) -> Self {
        Self {
            queue,
            mailer,
            config,
        }
    }

    /// Runs until the shutdown flag flips. The select sits *between*
    /// batches: an in-flight batch always completes its sends first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.config.poll_interval);
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "Email worker started"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!(error = %e, "Email batch processing failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Email worker shutting down");
                    break;
                }
            }
        }
    }

    /// One poll: claim, then walk the batch sequentially.
    async fn process_batch(&self) -> Result<(), ApiError> {
        let batch = self
            .queue
            .claim_batch(self.config.batch_size, self.config.max_attempts)
            .await?;

        if batch.is_empty() {
            return Ok(());
        }
        info!(claimed = batch.len(), "Claimed email batch");

        for email in batch {
            self.deliver(email).await?;
        }
        Ok(())
    }

    /// One row: send, record the attempt, settle the status.
    async fn deliver(&self, email: QueuedEmail) -> Result<(), ApiError> {
        debug_assert_eq!(email.status, EmailStatus::Pending);

        let send_result = self.mailer.send(&email).await;
        let attempts_done = email.attempt_count + 1;

        match &send_result {
            Ok(()) => self.queue.record_attempt(email.email_id, None).await?,
            Err(e) => {
                self.queue
                    .record_attempt(email.email_id, Some(&e.to_string()))
                    .await?
            }
        }

        match outcome_after_attempt(
            send_result.is_ok(),
            attempts_done,
            self.config.max_attempts,
        ) {
            AttemptOutcome::Sent => {
                self.queue.mark_sent(email.email_id).await?;
                info!(email_id = %email.email_id, kind = %email.kind, "Email sent");
            }
            AttemptOutcome::RetryLater => {
                warn!(
                    email_id = %email.email_id,
                    attempts = attempts_done,
                    "Email attempt failed; will retry"
                );
            }
            AttemptOutcome::Failed => {
                self.queue.mark_failed(email.email_id).await?;
                error!(
                    email_id = %email.email_id,
                    attempts = attempts_done,
                    "Email permanently failed"
                );
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_sent_regardless_of_history() {
        assert_eq!(outcome_after_attempt(true, 1, 5), AttemptOutcome::Sent);
        assert_eq!(outcome_after_attempt(true, 5, 5), AttemptOutcome::Sent);
    }

    #[test]
    fn test_failure_retries_until_budget_exhausted() {
        assert_eq!(outcome_after_attempt(false, 1, 5), AttemptOutcome::RetryLater);
        assert_eq!(outcome_after_attempt(false, 4, 5), AttemptOutcome::RetryLater);
    }

    #[test]
    fn test_final_failure_is_terminal() {
        assert_eq!(outcome_after_attempt(false, 5, 5), AttemptOutcome::Failed);
        assert_eq!(outcome_after_attempt(false, 6, 5), AttemptOutcome::Failed);
    }
}
