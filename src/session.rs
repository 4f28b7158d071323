//! Per-article reading session: the shared context handed to each component
//! and the init/cleanup lifecycle that wires them together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::document::Document;
use crate::error::AppError;
use crate::highlights::HighlightEngine;
use crate::models::HighlightColor;
use crate::storage::{KeyValueStore, Storage, DEFAULT_QUOTA_BYTES};
use crate::tracker::ProgressTracker;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub scroll_debounce: Duration,
    pub completion_threshold: f64,
    pub resume_threshold: f64,
    pub min_selection_chars: usize,
    pub default_color: HighlightColor,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scroll_debounce: Duration::from_millis(500),
            completion_threshold: 90.0,
            resume_threshold: 100.0,
            min_selection_chars: 4,
            default_color: HighlightColor::Yellow,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            scroll_debounce: Duration::from_millis(config.scroll_debounce_ms),
            completion_threshold: config.completion_threshold,
            resume_threshold: config.resume_threshold,
            min_selection_chars: config.min_selection_chars,
            default_color: config.default_color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Short-lived message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Everything a session component needs, built once per article.
#[derive(Clone)]
pub struct SessionContext {
    pub article_id: Arc<str>,
    pub storage: Storage,
    pub preferences: Arc<KeyValueStore>,
    pub options: SessionOptions,
    notices: mpsc::UnboundedSender<Notice>,
}

impl SessionContext {
    pub fn new(
        article_id: &str,
        storage: Storage,
        preferences: Arc<KeyValueStore>,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        let ctx = Self {
            article_id: Arc::from(article_id),
            storage,
            preferences,
            options,
            notices,
        };
        (ctx, rx)
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.notices.send(Notice {
            level,
            message: message.into(),
        });
    }

    /// Quota errors reach the user; everything else only reaches the log.
    pub fn report_write_failure(&self, what: &str, err: &AppError) {
        if err.is_quota_exceeded() {
            tracing::warn!(article = %self.article_id, error = %err, "storage quota exceeded saving {what}");
            self.notify(
                NoticeLevel::Error,
                format!("Storage is full, {what} was not saved"),
            );
        } else {
            tracing::warn!(article = %self.article_id, error = %err, "failed to save {what}");
        }
    }
}

/// Opens the preference store, independent of the backend chain.
pub async fn open_preferences(path: &Path) -> Arc<KeyValueStore> {
    match KeyValueStore::open(path, DEFAULT_QUOTA_BYTES).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(error = %e, "preferences unavailable, keeping them in memory");
            Arc::new(KeyValueStore::in_memory(DEFAULT_QUOTA_BYTES))
        }
    }
}

pub struct ReadingSession {
    pub ctx: SessionContext,
    pub document: Document,
    pub highlights: HighlightEngine,
    pub tracker: ProgressTracker,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl ReadingSession {
    /// Restores highlights into `document`, seeds the tracker from stored
    /// stats and starts the reading timer.
    pub async fn init(
        ctx: SessionContext,
        notices: mpsc::UnboundedReceiver<Notice>,
        mut document: Document,
    ) -> Self {
        let highlights = HighlightEngine::new(ctx.clone());
        let tracker = ProgressTracker::new(ctx.clone());

        highlights.load_highlights(&mut document).await;
        tracker.load().await;
        tracker.start_reading_timer();

        tracing::info!(
            article = %ctx.article_id,
            storage = ctx.storage.storage_type(),
            preferences_persistent = ctx.preferences.is_persistent(),
            "reading session started"
        );

        Self {
            ctx,
            document,
            highlights,
            tracker,
            notices,
        }
    }

    pub fn try_next_notice(&mut self) -> Option<Notice> {
        self.notices.try_recv().ok()
    }

    /// Final save, then stops the timer and any pending debounced write.
    pub async fn cleanup(&self) {
        self.tracker.cleanup().await;
        tracing::info!(article = %self.ctx.article_id, "reading session closed");
    }
}
