//! One pipeline cycle: fetch, generate, post, mark.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::cancel::CancelSignal;
use super::config::PipelineConfig;
use super::error::PipelineError;
use crate::llm::{GenerationError, ResponseGenerator};
use crate::models::{ParentMessage, ReplyRecord};
use crate::platform::Platform;
use crate::rate_limit::{EndpointClass, RateLimiter};
use crate::repository::{DbError, MarkOutcome, ReplyStore};
use crate::services::{ReplyFetcher, ReplyPoster};

/// What a cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Parents inside the lookback window.
    pub parents: usize,
    /// Replies returned by the platform across all parents.
    pub fetched: usize,
    pub responded: usize,
    pub generation_failures: usize,
    pub post_failures: usize,
    /// Replies closed after reaching the retry cap.
    pub abandoned: usize,
    /// Replies skipped because this cycle already tried them.
    pub already_attempted: usize,
    /// Parents skipped over a database error.
    pub store_errors: usize,
    /// The platform reported quota exhaustion and the cycle stopped early.
    pub rate_limited: bool,
    pub cancelled: bool,
}

/// State shared by the workers of one cycle. Dropped when the cycle ends.
#[derive(Default)]
struct CycleState {
    attempted: Mutex<HashSet<String>>,
    halted: AtomicBool,
    report: Mutex<CycleReport>,
}

impl CycleState {
    fn bump(&self, update: impl FnOnce(&mut CycleReport)) {
        if let Ok(mut report) = self.report.lock() {
            update(&mut report);
        }
    }

    /// Stop all workers; the platform is out of quota.
    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        self.bump(|r| r.rate_limited = true);
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Claim `id` for this cycle. False if some worker already tried it.
    fn claim(&self, id: &str) -> bool {
        match self.attempted.lock() {
            Ok(mut attempted) => attempted.insert(id.to_string()),
            Err(_) => false,
        }
    }

    fn into_report(self) -> CycleReport {
        self.report
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives discovery and response for every recent parent message.
///
/// Cycles never overlap: a second `run_cycle` call waits for the first.
pub struct PipelineRunner {
    store: ReplyStore,
    fetcher: ReplyFetcher,
    poster: ReplyPoster,
    generator: Arc<dyn ResponseGenerator>,
    limiter: RateLimiter,
    config: PipelineConfig,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl PipelineRunner {
    pub fn new(
        store: ReplyStore,
        platform: Arc<dyn Platform>,
        limiter: RateLimiter,
        generator: Arc<dyn ResponseGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher: ReplyFetcher::new(platform.clone(), limiter.clone(), store.clone()),
            poster: ReplyPoster::new(platform, limiter.clone()),
            limiter,
            store,
            generator,
            config,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one cycle over all parents posted within the lookback window.
    ///
    /// Only a failure to list parents is returned as an error. Everything
    /// below that is logged and counted in the report.
    pub async fn run_cycle(&self, cancel: &CancelSignal) -> Result<CycleReport, PipelineError> {
        let _cycle = self.cycle_lock.lock().await;

        let lookback = chrono::Duration::from_std(self.config.lookback())
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let parents = self.store.list_recent_parents(Utc::now() - lookback).await?;
        info!(parents = parents.len(), "Starting reply cycle");

        let state = CycleState::default();
        state.bump(|r| r.parents = parents.len());

        stream::iter(&parents)
            .for_each_concurrent(self.config.workers.max(1), |parent| {
                let state = &state;
                async move {
                    if let Err(e) = self.process_parent(parent, state, cancel).await {
                        error!(parent_id = %parent.id, "Skipping parent after database error: {}", e);
                        state.bump(|r| r.store_errors += 1);
                    }
                }
            })
            .await;

        let report = state.into_report();
        info!(
            responded = report.responded,
            generation_failures = report.generation_failures,
            post_failures = report.post_failures,
            abandoned = report.abandoned,
            rate_limited = report.rate_limited,
            cancelled = report.cancelled,
            "Reply cycle finished"
        );
        for class in EndpointClass::ALL {
            let usage = self.limiter.usage(class).await;
            debug!(
                class = %class,
                requests = usage.current_requests,
                buffer_quota = usage.buffer_quota,
                "Rate window at {:.1}%",
                usage.usage_percentage()
            );
        }
        Ok(report)
    }

    async fn process_parent(
        &self,
        parent: &ParentMessage,
        state: &CycleState,
        cancel: &CancelSignal,
    ) -> Result<(), DbError> {
        if state.is_halted() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            state.bump(|r| r.cancelled = true);
            return Ok(());
        }

        let outcome = self
            .fetcher
            .fetch_replies(&parent.id, &parent.author_handle, self.config.max_replies_per_fetch)
            .await?;
        state.bump(|r| r.fetched += outcome.replies.len());
        if outcome.is_rate_limited() {
            warn!(parent_id = %parent.id, "Search quota exhausted, ending cycle");
            state.halt();
            return Ok(());
        }

        let pending = self.store.list_unprocessed(&parent.id).await?;
        debug!(parent_id = %parent.id, pending = pending.len(), "Answering replies");

        for reply in &pending {
            if cancel.is_cancelled() {
                state.bump(|r| r.cancelled = true);
                break;
            }
            if state.is_halted() {
                break;
            }
            if !state.claim(&reply.id) {
                state.bump(|r| r.already_attempted += 1);
                continue;
            }
            self.respond(reply, state).await?;
        }
        Ok(())
    }

    /// Generate and post one response, then record the outcome.
    async fn respond(&self, reply: &ReplyRecord, state: &CycleState) -> Result<(), DbError> {
        let timeout = self.config.generation_timeout();
        let generated = tokio::time::timeout(timeout, self.generator.generate(&reply.text))
            .await
            .unwrap_or(Err(GenerationError::Timeout(timeout)));

        let text = match generated {
            Ok(text) => text,
            Err(e) => {
                warn!(parent_id = %reply.parent_id, reply_id = %reply.id, "Response generation failed: {}", e);
                state.bump(|r| r.generation_failures += 1);
                return self.record_failure(reply, &e.to_string(), state).await;
            }
        };

        match self.poster.post_response(&text, &reply.id).await {
            Ok(response_id) => {
                match self
                    .store
                    .mark_processed(&reply.id, &response_id, Utc::now())
                    .await?
                {
                    MarkOutcome::Marked => state.bump(|r| r.responded += 1),
                    MarkOutcome::AlreadyProcessed => warn!(
                        reply_id = %reply.id,
                        response_id,
                        "Reply was already marked processed elsewhere"
                    ),
                }
                Ok(())
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!(reply_id = %reply.id, "Post quota exhausted, ending cycle");
                state.halt();
                Ok(())
            }
            Err(e) => {
                state.bump(|r| r.post_failures += 1);
                self.record_failure(reply, &e.to_string(), state).await
            }
        }
    }

    async fn record_failure(
        &self,
        reply: &ReplyRecord,
        reason: &str,
        state: &CycleState,
    ) -> Result<(), DbError> {
        let Some(retry_count) = self.store.increment_retry(&reply.id, reason).await? else {
            return Ok(());
        };
        if self.config.retries_exhausted(retry_count) {
            if self.store.abandon(&reply.id, Utc::now()).await? == MarkOutcome::Marked {
                warn!(reply_id = %reply.id, retry_count, "Abandoning reply after repeated failures");
                state.bump(|r| r.abandoned += 1);
            }
        }
        Ok(())
    }
}
