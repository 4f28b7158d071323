//! Reading progress: scroll percentage, time on page, completion and the
//! resume-on-reopen protocol.

mod debounce;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::{Progress, Stats};
use crate::session::SessionContext;

use debounce::Debouncer;
pub use state::{ReadingState, TimerStatus};

/// Preference key for "always resume where I left off".
pub const AUTO_RESUME_KEY: &str = "reading-auto-resume";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub document_height: f64,
    pub window_height: f64,
}

/// Percentage of the scrollable extent above `scroll_top`, clamped to
/// `[0, 100]` with one decimal. A document that fits in the window counts as
/// fully read.
pub fn scroll_percentage(metrics: &ScrollMetrics) -> f64 {
    let scrollable = metrics.document_height - metrics.window_height;
    if scrollable <= 0.0 {
        return 100.0;
    }
    let pct = (metrics.scroll_top / scrollable * 100.0).clamp(0.0, 100.0);
    if pct.is_nan() {
        return 0.0;
    }
    (pct * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResumeDecision {
    StartFresh,
    AutoResume(f64),
    Prompt(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollUpdate {
    pub percentage: f64,
    pub completion_reached: bool,
}

struct Inner {
    ctx: SessionContext,
    state: Mutex<ReadingState>,
    stored: Mutex<Option<Progress>>,
    visible: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
    debouncer: Debouncer,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ReadingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .ticker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl ProgressTracker {
    pub fn new(ctx: SessionContext) -> Self {
        let threshold = ctx.options.completion_threshold;
        let delay = ctx.options.scroll_debounce;
        Self {
            inner: Arc::new(Inner {
                ctx,
                state: Mutex::new(ReadingState::new(threshold)),
                stored: Mutex::new(None),
                visible: AtomicBool::new(true),
                ticker: Mutex::new(None),
                debouncer: Debouncer::new(delay),
            }),
        }
    }

    /// Reads stored progress and stats. Time spent and the completed flag
    /// carry over from earlier sessions.
    pub async fn load(&self) -> Option<Progress> {
        let ctx = &self.inner.ctx;
        let stats = match ctx.storage.one::<Stats>(&ctx.article_id).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(article = %ctx.article_id, error = %e, "failed to read stats");
                None
            }
        };
        if let Some(stats) = stats {
            self.inner.state().seed(stats.total_time_spent, stats.completed);
        }

        let progress = match ctx.storage.one::<Progress>(&ctx.article_id).await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(article = %ctx.article_id, error = %e, "failed to read progress");
                None
            }
        };
        *self.inner.stored.lock().unwrap_or_else(PoisonError::into_inner) = progress.clone();
        progress
    }

    pub async fn always_resume(&self) -> bool {
        self.inner
            .ctx
            .preferences
            .get_item(AUTO_RESUME_KEY)
            .await
            .is_some_and(|v| v == "true")
    }

    pub async fn set_always_resume(&self, enabled: bool) {
        let prefs = &self.inner.ctx.preferences;
        let result = if enabled {
            prefs.set_item(AUTO_RESUME_KEY, "true".to_string()).await
        } else {
            prefs.remove_item(AUTO_RESUME_KEY).await
        };
        if let Err(e) = result {
            self.inner.ctx.report_write_failure("resume preference", &e);
        }
    }

    /// What to do with the position loaded by [`ProgressTracker::load`].
    pub async fn resume_decision(&self) -> ResumeDecision {
        let stored = self
            .inner
            .stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(progress) = stored else {
            return ResumeDecision::StartFresh;
        };
        if progress.scroll_position <= self.inner.ctx.options.resume_threshold {
            return ResumeDecision::StartFresh;
        }
        if self.always_resume().await {
            ResumeDecision::AutoResume(progress.scroll_position)
        } else {
            ResumeDecision::Prompt(progress.scroll_position)
        }
    }

    /// Starts the one-second ticker. Calling it again is a no-op.
    pub fn start_reading_timer(&self) {
        self.inner.state().start();

        let mut ticker = self.inner.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let visible = inner.visible.load(Ordering::Relaxed);
                inner.state().tick(visible);
            }
        }));
    }

    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.store(visible, Ordering::Relaxed);
    }

    /// Records a scroll. Saves are debounced, except the one that marks the
    /// article completed, which is written straight away.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> ScrollUpdate {
        let percentage = scroll_percentage(&metrics);
        let completion_reached = self.inner.state().observe(metrics.scroll_top, percentage);

        if completion_reached {
            tracing::info!(article = %self.inner.ctx.article_id, percentage, "article completed");
            self.inner.debouncer.cancel();
            self.save().await;
        } else {
            let tracker = self.clone();
            self.inner.debouncer.schedule(async move { tracker.save().await });
        }

        ScrollUpdate {
            percentage,
            completion_reached,
        }
    }

    /// Moves to a stored position without prompting for completion.
    pub fn restore(&self, metrics: ScrollMetrics) -> f64 {
        let percentage = scroll_percentage(&metrics);
        self.inner.state().restore(metrics.scroll_top, percentage);
        percentage
    }

    pub fn percentage(&self) -> f64 {
        self.inner.state().percentage
    }

    pub fn time_spent(&self) -> u64 {
        self.inner.state().time_spent
    }

    pub fn status(&self) -> TimerStatus {
        self.inner.state().status
    }

    pub fn snapshot(&self) -> ReadingState {
        self.inner.state().clone()
    }

    pub fn toggle_pause(&self) -> TimerStatus {
        self.inner.state().toggle()
    }

    /// "Continue" on the completion prompt.
    pub fn continue_reading(&self) {
        let mut state = self.inner.state();
        if state.awaiting_completion_choice() {
            state.resume();
        }
    }

    /// "Revise" on the completion prompt. The caller scrolls back to the top.
    pub fn revise(&self) {
        self.inner.state().revise();
    }

    /// Upserts progress and stats for the article.
    pub async fn save(&self) {
        let ctx = &self.inner.ctx;
        let snapshot = self.snapshot();
        let now = Utc::now().timestamp_millis();

        let progress = Progress {
            article_id: ctx.article_id.to_string(),
            scroll_position: snapshot.scroll_position,
            percentage: snapshot.percentage,
            last_read: now,
        };
        if let Err(e) = ctx.storage.put(progress).await {
            ctx.report_write_failure("reading progress", &e);
        }

        let stats = Stats {
            article_id: ctx.article_id.to_string(),
            total_time_spent: snapshot.time_spent,
            percentage: snapshot.percentage,
            last_visit: now,
            completed: snapshot.completed,
        };
        if let Err(e) = ctx.storage.put(stats).await {
            ctx.report_write_failure("reading stats", &e);
        }
        tracing::debug!(article = %ctx.article_id, percentage = snapshot.percentage, "progress saved");
    }

    /// Stops the ticker and any pending save, then saves once more.
    pub async fn cleanup(&self) {
        if self.inner.debouncer.is_pending() {
            tracing::debug!(article = %self.inner.ctx.article_id, "replacing pending save with final save");
        }
        self.inner.debouncer.cancel();
        if let Some(handle) = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.save().await;
    }
}
