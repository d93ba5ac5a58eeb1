use crate::domain::{
    AddressRecord, BatchSummary, Confidence, FailReason, GeocodeOutcome, RecordOutcome,
    ScoredCandidate,
};
use crate::error::{GeocodeError, Result};
use crate::normalizer;
use crate::provider::GeocodeProvider;
use crate::scoring::score_candidates;
use crate::storage::{ReportSelection, ReportStore};
use crate::validator::{validate, Validation};
use chrono::Utc;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Run-mode configuration for one batch, shaped by the CLI flags.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute everything but never write to the store.
    pub dry_run: bool,
    /// Re-resolve records that already hold a successful outcome.
    pub force: bool,
    /// Ask the operator to confirm each proposed result before writing.
    pub interactive: bool,
    /// Process at most this many records.
    pub limit: Option<usize>,
    /// Restrict the run to these record ids.
    pub ids: Option<Vec<i64>>,
}

impl RunOptions {
    fn selection(&self) -> ReportSelection {
        ReportSelection {
            ids: self.ids.clone(),
            include_resolved: self.force,
        }
    }
}

/// Cooperative stop signal, checked between records so each outcome write is
/// fully committed or not attempted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Operator confirmation seam for interactive mode.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, record: &AddressRecord, outcome: &GeocodeOutcome) -> bool;
}

/// Reads a y/n answer from stdin.
pub struct StdinPrompt;

impl ConfirmPrompt for StdinPrompt {
    fn confirm(&self, record: &AddressRecord, outcome: &GeocodeOutcome) -> bool {
        println!("\n   Report #{}: {}", record.id, record.address);
        println!(
            "   📌 Coordinates: {:.6}, {:.6} ({})",
            outcome.latitude,
            outcome.longitude,
            outcome.confidence.as_str()
        );
        println!(
            "   🗺️  View: https://www.google.com/maps?q={},{}",
            outcome.latitude, outcome.longitude
        );
        print!("   Accept this result? (y/n): ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        line.trim().eq_ignore_ascii_case("y")
    }
}

/// What the resolution pipeline produced for one record before persistence.
#[derive(Debug)]
pub enum Resolution {
    Resolved {
        outcome: GeocodeOutcome,
        best: ScoredCandidate,
    },
    Unresolved(FailReason),
}

/// Drives address records through normalize -> dispatch -> score -> validate
/// and reports each terminal state to the store, one record at a time.
pub struct BatchOrchestrator {
    store: Arc<dyn ReportStore>,
    provider: Arc<dyn GeocodeProvider>,
    prompt: Option<Box<dyn ConfirmPrompt>>,
    cancel: CancelToken,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<dyn ReportStore>, provider: Arc<dyn GeocodeProvider>) -> Self {
        Self {
            store,
            provider,
            prompt: None,
            cancel: CancelToken::new(),
        }
    }

    /// Install the confirmation prompt used in interactive mode.
    pub fn with_prompt(mut self, prompt: Box<dyn ConfirmPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one batch under the given options. Resolution-path failures are
    /// per-record outcomes; only store write failures abort the run, since a
    /// half-written outcome would corrupt resumability.
    #[instrument(skip(self, options))]
    pub async fn run(&self, options: &RunOptions) -> Result<BatchSummary> {
        let run_id = Uuid::new_v4();
        let mut records = self.store.fetch_reports(&options.selection()).await?;
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }

        let total = records.len();
        let mut summary = BatchSummary::new(run_id, total);
        info!(run_id = %run_id, total, dry_run = options.dry_run, "Starting geocode batch");

        for (idx, record) in records.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    "Cancellation requested; stopping after {} of {} record(s)",
                    idx, total
                );
                break;
            }

            // Already-resolved records short-circuit to Skipped; the
            // provider is never contacted for them.
            if record.is_resolved() && !options.force {
                debug!("Report #{} already geocoded, skipping", record.id);
                summary.already_resolved += 1;
                summary.record(record.id, &RecordOutcome::Skipped);
                continue;
            }

            info!(
                "[{}/{}] Resolving report #{}: {}",
                idx + 1,
                total,
                record.id,
                record.address
            );

            let resolution = self.resolve(&record).await;
            let outcome = self.finish_record(&record, resolution, options).await?;
            summary.record(record.id, &outcome);
        }

        info!(
            run_id = %run_id,
            success = summary.success,
            failed = summary.failed,
            skipped = summary.skipped,
            "Finished geocode batch"
        );
        Ok(summary)
    }

    /// Resolve one record through the full pipeline. Never fails the batch;
    /// every error becomes an Unresolved reason.
    async fn resolve(&self, record: &AddressRecord) -> Resolution {
        let normalized = normalizer::normalize(&record.address);
        if normalized.is_empty() {
            debug!("Report #{} has no usable address tokens", record.id);
            return Resolution::Unresolved(FailReason::NoMatch);
        }

        let candidates = match self.provider.search(&normalized).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Provider request failed for report #{}: {}", record.id, e);
                return Resolution::Unresolved(FailReason::Network);
            }
        };

        let scored = score_candidates(&normalized.tokens, candidates);
        let Some(best) = scored.into_iter().next() else {
            return Resolution::Unresolved(FailReason::NoMatch);
        };
        debug!(
            "Report #{} best candidate '{}' scored {:.2}",
            record.id, best.candidate.display_name, best.score
        );

        match validate(&best.candidate) {
            Validation::OutOfBounds {
                latitude,
                longitude,
            } => {
                warn!(
                    "Report #{} resolved outside Indonesia: ({:.4}, {:.4})",
                    record.id, latitude, longitude
                );
                Resolution::Unresolved(FailReason::OutOfBounds)
            }
            Validation::InBounds(confidence) => {
                let outcome = GeocodeOutcome::from_provider(
                    best.candidate.latitude,
                    best.candidate.longitude,
                    confidence,
                );
                Resolution::Resolved { outcome, best }
            }
        }
    }

    /// Apply run-mode policy and persist the terminal state. Store errors
    /// propagate and halt the batch.
    async fn finish_record(
        &self,
        record: &AddressRecord,
        resolution: Resolution,
        options: &RunOptions,
    ) -> Result<RecordOutcome> {
        match resolution {
            Resolution::Resolved { outcome, .. } => {
                if options.interactive {
                    let accepted = match &self.prompt {
                        Some(prompt) => prompt.confirm(record, &outcome),
                        None => {
                            return Err(GeocodeError::Config(
                                "Interactive mode requires a confirmation prompt".to_string(),
                            ))
                        }
                    };
                    if !accepted {
                        info!("Report #{} declined by operator", record.id);
                        return Ok(RecordOutcome::Skipped);
                    }
                }

                if outcome.confidence == Confidence::Low {
                    warn!(
                        "Report #{} resolved at LOW confidence; flagged for review",
                        record.id
                    );
                }

                if options.dry_run {
                    info!(
                        "[DRY RUN] Would store ({:.6}, {:.6}) {} for report #{}",
                        outcome.latitude,
                        outcome.longitude,
                        outcome.confidence.as_str(),
                        record.id
                    );
                } else {
                    self.store.write_success(record.id, &outcome).await?;
                    debug!("Stored outcome for report #{}", record.id);
                }
                Ok(RecordOutcome::Success {
                    confidence: outcome.confidence,
                })
            }
            Resolution::Unresolved(reason) => {
                info!("Report #{} failed: {}", record.id, reason.as_str());
                if !options.dry_run {
                    self.store
                        .write_failure(record.id, reason, Utc::now())
                        .await?;
                }
                Ok(RecordOutcome::Failed { reason })
            }
        }
    }
}
