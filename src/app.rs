use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::document::{Boundary, Layout, TextRange};
use crate::error::Result;
use crate::models::HighlightColor;
use crate::session::{Notice, NoticeLevel, ReadingSession};
use crate::tracker::{ResumeDecision, ScrollMetrics, TimerStatus};
use crate::tui::{AppAction, InputMode};

const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Row and column in the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Caret {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dialog {
    Resume(f64),
    Completion,
}

pub struct App {
    // Data
    pub session: ReadingSession,
    pub title: String,
    pub layout: Layout,

    // UI State
    pub scroll: usize,
    pub viewport_height: usize,
    /// Anchor and caret while selecting.
    pub selection: Option<(Caret, Caret)>,
    pub pending_removal: Option<String>,
    pub dialog: Option<Dialog>,
    pub show_help: bool,
    pub notice: Option<(Notice, Instant)>,

    export_dir: PathBuf,
}

impl App {
    pub async fn new(
        session: ReadingSession,
        title: String,
        export_dir: PathBuf,
        width: usize,
        height: usize,
    ) -> Self {
        let layout = session.document.layout(width);
        let mut app = Self {
            session,
            title,
            layout,
            scroll: 0,
            viewport_height: height,
            selection: None,
            pending_removal: None,
            dialog: None,
            show_help: false,
            notice: None,
            export_dir,
        };

        match app.session.tracker.resume_decision().await {
            ResumeDecision::StartFresh => {}
            ResumeDecision::AutoResume(position) => app.jump_to(position),
            ResumeDecision::Prompt(position) => app.dialog = Some(Dialog::Resume(position)),
        }
        app
    }

    pub fn input_mode(&self) -> InputMode {
        if self.show_help {
            InputMode::Help
        } else if let Some(dialog) = self.dialog {
            match dialog {
                Dialog::Resume(_) => InputMode::ResumePrompt,
                Dialog::Completion => InputMode::CompletionPrompt,
            }
        } else if self.pending_removal.is_some() {
            InputMode::ConfirmRemove
        } else if self.selection.is_some() {
            InputMode::Selecting
        } else {
            InputMode::Reading
        }
    }

    pub fn color(&self) -> HighlightColor {
        self.session.highlights.color()
    }

    pub fn percentage(&self) -> f64 {
        self.session.tracker.percentage()
    }

    pub fn time_spent(&self) -> u64 {
        self.session.tracker.time_spent()
    }

    pub fn is_paused(&self) -> bool {
        self.session.tracker.status() == TimerStatus::Paused
    }

    pub fn storage_type(&self) -> &'static str {
        self.session.ctx.storage.storage_type()
    }

    pub fn caret(&self) -> Option<Caret> {
        self.selection.map(|(_, caret)| caret)
    }

    pub fn is_selected(&self, row: usize, col: usize) -> bool {
        let Some((a, b)) = self.selection else {
            return false;
        };
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        (start..=end).contains(&Caret { row, col })
    }

    /// Called before every draw with the article viewport size.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.layout.width {
            let anchors = self
                .selection
                .map(|(anchor, caret)| (self.text_position(anchor), self.text_position(caret)));
            self.layout = self.session.document.layout(width);
            self.selection = anchors.and_then(|(anchor, caret)| {
                Some((self.caret_at(anchor?)?, self.caret_at(caret?)?))
            });
        }
        self.viewport_height = height;
        self.scroll = self.scroll.min(self.max_scroll());
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.session.tracker.set_visible(focused);
    }

    /// Pulls notices from the session and expires the shown one.
    pub fn poll_notices(&mut self) {
        while let Some(notice) = self.session.try_next_notice() {
            self.notice = Some((notice, Instant::now()));
        }
        if self
            .notice
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() > NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::ScrollDown => self.scroll_to(self.scroll + 1).await,
            AppAction::ScrollUp => self.scroll_to(self.scroll.saturating_sub(1)).await,
            AppAction::PageDown => {
                let page = self.viewport_height.saturating_sub(1).max(1);
                self.scroll_to(self.scroll + page).await;
            }
            AppAction::PageUp => {
                let page = self.viewport_height.saturating_sub(1).max(1);
                self.scroll_to(self.scroll.saturating_sub(page)).await;
            }
            AppAction::ScrollToTop => self.scroll_to(0).await,
            AppAction::ScrollToBottom => self.scroll_to(self.max_scroll()).await,

            AppAction::SetColor(color) => {
                self.session.highlights.set_color(color);
            }

            AppAction::TogglePause => {
                let status = self.session.tracker.toggle_pause();
                tracing::debug!(?status, "timer toggled");
            }

            AppAction::Export => {
                self.session.highlights.export_to(&self.export_dir).await;
            }

            AppAction::ShowHelp => self.show_help = true,
            AppAction::HideHelp => self.show_help = false,

            AppAction::StartSelection => {
                if let Some(row) = self.layout.first_text_row(self.scroll) {
                    let caret = Caret { row, col: 0 };
                    self.selection = Some((caret, caret));
                }
            }
            AppAction::CancelSelection => self.selection = None,

            AppAction::CaretLeft => self.move_caret(|app, c| app.prev_cell(c)).await,
            AppAction::CaretRight => self.move_caret(|app, c| app.next_cell(c)).await,
            AppAction::CaretUp => self.move_caret(|app, c| app.row_up(c)).await,
            AppAction::CaretDown => self.move_caret(|app, c| app.row_down(c)).await,
            AppAction::CaretWordForward => self.move_caret(|app, c| app.word_forward(c)).await,
            AppAction::CaretWordBack => self.move_caret(|app, c| app.word_back(c)).await,

            AppAction::SetAnchor => {
                if let Some((_, caret)) = self.selection {
                    self.selection = Some((caret, caret));
                }
            }
            AppAction::SaveHighlight => self.save_highlight().await,

            AppAction::RequestRemove => {
                self.pending_removal = self.caret().and_then(|caret| {
                    let cell = self.layout.cell(caret.row, caret.col)?;
                    let path = self.layout.node_path(cell);
                    self.session.document.highlight_at(path)
                });
            }
            AppAction::ConfirmRemove => {
                if let Some(id) = self.pending_removal.take() {
                    let session = &mut self.session;
                    if session
                        .highlights
                        .remove_highlight(&mut session.document, &id)
                        .await
                    {
                        self.relayout();
                        self.session.ctx.notify(NoticeLevel::Info, "Highlight removed");
                    }
                }
            }
            AppAction::CancelRemove => self.pending_removal = None,

            AppAction::ResumeReading => {
                if let Some(Dialog::Resume(position)) = self.dialog.take() {
                    self.jump_to(position);
                }
            }
            AppAction::AlwaysResume => {
                if let Some(Dialog::Resume(position)) = self.dialog.take() {
                    self.session.tracker.set_always_resume(true).await;
                    self.jump_to(position);
                }
            }
            AppAction::StartOver => {
                if self.dialog.take().is_some() {
                    // overwrite the stored position now rather than at the next scroll
                    self.jump_to(0.0);
                    self.session.tracker.save().await;
                    self.session.ctx.notify(NoticeLevel::Info, "Starting from the top");
                }
            }

            AppAction::ContinueReading => {
                self.session.tracker.continue_reading();
                self.dialog = None;
            }
            AppAction::Revise => {
                self.session.tracker.revise();
                self.scroll = 0;
                self.selection = None;
                self.dialog = None;
            }
        }

        Ok(false)
    }

    fn max_scroll(&self) -> usize {
        self.layout.height().saturating_sub(self.viewport_height)
    }

    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll as f64,
            document_height: self.layout.height() as f64,
            window_height: self.viewport_height as f64,
        }
    }

    async fn scroll_to(&mut self, row: usize) {
        self.scroll = row.min(self.max_scroll());
        let update = self.session.tracker.on_scroll(self.metrics()).await;
        if update.completion_reached {
            self.selection = None;
            self.pending_removal = None;
            self.dialog = Some(Dialog::Completion);
        }
    }

    /// Restores a stored position without a completion prompt.
    fn jump_to(&mut self, position: f64) {
        self.scroll = (position.max(0.0).round() as usize).min(self.max_scroll());
        self.session.tracker.restore(self.metrics());
    }

    fn relayout(&mut self) {
        self.layout = self.session.document.layout(self.layout.width);
    }

    async fn move_caret(&mut self, step: impl Fn(&Self, Caret) -> Caret) {
        let Some((anchor, caret)) = self.selection else {
            return;
        };
        let caret = step(self, caret);
        self.selection = Some((anchor, caret));

        if caret.row < self.scroll {
            self.scroll_to(caret.row).await;
        } else if caret.row >= self.scroll + self.viewport_height {
            self.scroll_to(caret.row + 1 - self.viewport_height).await;
        }
    }

    async fn save_highlight(&mut self) {
        let Some(range) = self.selection_range() else {
            return;
        };
        let session = &mut self.session;
        let saved = session
            .highlights
            .highlight_selection(&mut session.document, &range)
            .await;
        if let Some(highlight) = saved {
            self.relayout();
            self.selection = None;
            self.session.ctx.notify(
                NoticeLevel::Success,
                format!("Highlighted in {}", highlight.color),
            );
        }
    }

    fn selection_range(&self) -> Option<TextRange> {
        let (a, b) = self.selection?;
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let first = self.layout.cell(start.row, start.col)?;
        let last = self.layout.cell(end.row, end.col)?;
        Some(TextRange {
            start: Boundary::new(self.layout.node_path(first).to_vec(), first.offset),
            end: Boundary::new(self.layout.node_path(last).to_vec(), last.offset + 1),
        })
    }

    /// Text node and offset under a caret, stable across rewraps.
    fn text_position(&self, caret: Caret) -> Option<(Vec<usize>, usize)> {
        let cell = self.layout.cell(caret.row, caret.col)?;
        Some((self.layout.node_path(cell).to_vec(), cell.offset))
    }

    fn caret_at(&self, (path, offset): (Vec<usize>, usize)) -> Option<Caret> {
        let (row, col) = self.layout.locate(&path, offset)?;
        Some(Caret { row, col })
    }

    fn row_len(&self, row: usize) -> usize {
        self.layout.lines.get(row).map_or(0, |l| l.cells.len())
    }

    fn next_text_row(&self, row: usize) -> Option<usize> {
        self.layout.first_text_row(row + 1)
    }

    fn prev_text_row(&self, row: usize) -> Option<usize> {
        (0..row).rev().find(|&r| self.row_len(r) > 0)
    }

    fn next_cell(&self, c: Caret) -> Caret {
        if c.col + 1 < self.row_len(c.row) {
            Caret { col: c.col + 1, ..c }
        } else {
            self.next_text_row(c.row)
                .map_or(c, |row| Caret { row, col: 0 })
        }
    }

    fn prev_cell(&self, c: Caret) -> Caret {
        if c.col > 0 {
            Caret { col: c.col - 1, ..c }
        } else {
            self.prev_text_row(c.row).map_or(c, |row| Caret {
                row,
                col: self.row_len(row) - 1,
            })
        }
    }

    fn row_down(&self, c: Caret) -> Caret {
        self.next_text_row(c.row).map_or(c, |row| Caret {
            row,
            col: c.col.min(self.row_len(row) - 1),
        })
    }

    fn row_up(&self, c: Caret) -> Caret {
        self.prev_text_row(c.row).map_or(c, |row| Caret {
            row,
            col: c.col.min(self.row_len(row) - 1),
        })
    }

    /// A word starts at a non-space cell that begins a row or follows a space.
    fn is_word_start(&self, c: Caret) -> bool {
        let is_space = |c: Caret| self.layout.cell(c.row, c.col).map_or(true, |cell| cell.ch == ' ');
        !is_space(c) && (c.col == 0 || is_space(Caret { col: c.col - 1, ..c }))
    }

    fn word_forward(&self, c: Caret) -> Caret {
        let mut cur = c;
        loop {
            let next = self.next_cell(cur);
            if next == cur {
                return c;
            }
            if self.is_word_start(next) {
                return next;
            }
            cur = next;
        }
    }

    fn word_back(&self, c: Caret) -> Caret {
        let mut cur = c;
        loop {
            let prev = self.prev_cell(cur);
            if prev == cur {
                return cur;
            }
            if self.is_word_start(prev) {
                return prev;
            }
            cur = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::document::tests::sample_document;
    use crate::models::{Highlight, Progress};
    use crate::session::tests::memory_context;
    use crate::session::{SessionContext, SessionOptions};
    use crate::storage::{KeyValueStore, Storage, DEFAULT_QUOTA_BYTES};

    async fn open(ctx: SessionContext, rx: tokio::sync::mpsc::UnboundedReceiver<Notice>) -> App {
        let session = ReadingSession::init(ctx, rx, sample_document()).await;
        App::new(session, "Title".into(), std::env::temp_dir(), 20, 3).await
    }

    async fn app() -> App {
        let (ctx, rx) = memory_context("my-post");
        open(ctx, rx).await
    }

    async fn stored_highlights(app: &App) -> Vec<Highlight> {
        app.session.ctx.storage.all("my-post").await.unwrap()
    }

    async fn select_hello(app: &mut App, extra: usize) {
        app.handle_action(AppAction::StartSelection).await.unwrap();
        app.handle_action(AppAction::CaretDown).await.unwrap();
        app.handle_action(AppAction::SetAnchor).await.unwrap();
        for _ in 0..extra {
            app.handle_action(AppAction::CaretRight).await.unwrap();
        }
    }

    #[tokio::test]
    async fn scrolling_reports_progress_and_completion() {
        let mut app = app().await;
        assert_eq!(app.layout.height(), 6);

        app.handle_action(AppAction::ScrollDown).await.unwrap();
        assert_eq!(app.scroll, 1);
        assert_eq!(app.percentage(), 33.3);

        app.handle_action(AppAction::ScrollToBottom).await.unwrap();
        assert_eq!(app.percentage(), 100.0);
        assert_eq!(app.input_mode(), InputMode::CompletionPrompt);
        assert!(app.is_paused());

        app.handle_action(AppAction::ContinueReading).await.unwrap();
        assert_eq!(app.input_mode(), InputMode::Reading);
        assert!(!app.is_paused());
    }

    #[tokio::test]
    async fn revise_goes_back_to_the_top() {
        let mut app = app().await;
        app.handle_action(AppAction::ScrollToBottom).await.unwrap();
        app.handle_action(AppAction::Revise).await.unwrap();
        assert_eq!(app.scroll, 0);
        assert_eq!(app.percentage(), 0.0);
        assert_eq!(app.time_spent(), 0);
        assert!(!app.is_paused());
    }

    #[tokio::test]
    async fn selection_becomes_highlight_in_active_color() {
        let mut app = app().await;
        app.handle_action(AppAction::SetColor(HighlightColor::Green)).await.unwrap();
        select_hello(&mut app, 4).await;
        assert!(app.is_selected(2, 2));
        app.handle_action(AppAction::SaveHighlight).await.unwrap();

        let stored = stored_highlights(&app).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "Hello");
        assert_eq!(stored[0].color, HighlightColor::Green);
        assert!(app.session.document.has_highlight(&stored[0].id));
        assert_eq!(app.input_mode(), InputMode::Reading);
        assert_eq!(
            app.layout.cell(2, 0).unwrap().style.highlight,
            Some(HighlightColor::Green)
        );
    }

    #[tokio::test]
    async fn short_selections_are_ignored() {
        let mut app = app().await;
        select_hello(&mut app, 2).await;
        app.handle_action(AppAction::SaveHighlight).await.unwrap();
        assert!(stored_highlights(&app).await.is_empty());
        assert_eq!(app.input_mode(), InputMode::Selecting);
    }

    #[tokio::test]
    async fn highlights_are_removed_after_confirmation() {
        let mut app = app().await;
        select_hello(&mut app, 4).await;
        app.handle_action(AppAction::SaveHighlight).await.unwrap();

        select_hello(&mut app, 1).await;
        app.handle_action(AppAction::RequestRemove).await.unwrap();
        assert_eq!(app.input_mode(), InputMode::ConfirmRemove);
        app.handle_action(AppAction::CancelRemove).await.unwrap();
        assert_eq!(stored_highlights(&app).await.len(), 1);

        app.handle_action(AppAction::RequestRemove).await.unwrap();
        app.handle_action(AppAction::ConfirmRemove).await.unwrap();
        assert!(stored_highlights(&app).await.is_empty());
        assert!(app.layout.cell(2, 0).unwrap().style.highlight.is_none());
        assert!(app.session.document.plain_text().contains("Hello world"));
    }

    #[tokio::test]
    async fn words_move_the_caret() {
        let mut app = app().await;
        select_hello(&mut app, 0).await;
        app.handle_action(AppAction::CaretWordForward).await.unwrap();
        assert_eq!(app.caret(), Some(Caret { row: 2, col: 6 }));
        app.handle_action(AppAction::CaretWordForward).await.unwrap();
        assert_eq!(app.caret(), Some(Caret { row: 2, col: 13 }));
        app.handle_action(AppAction::CaretWordBack).await.unwrap();
        assert_eq!(app.caret(), Some(Caret { row: 2, col: 6 }));
    }

    #[tokio::test]
    async fn selection_survives_a_rewrap() {
        let mut app = app().await;
        select_hello(&mut app, 0).await;
        app.handle_action(AppAction::CaretWordForward).await.unwrap();
        app.resize(40, 3);
        // "Hello world, this is fine prose." fits one row at width 40
        assert_eq!(app.selection, Some((Caret { row: 2, col: 0 }, Caret { row: 2, col: 6 })));
    }

    async fn with_stored_position() -> App {
        let options = SessionOptions {
            resume_threshold: 1.0,
            ..SessionOptions::default()
        };
        let (ctx, rx) = SessionContext::new(
            "my-post",
            Storage::in_memory(),
            Arc::new(KeyValueStore::in_memory(DEFAULT_QUOTA_BYTES)),
            options,
        );
        ctx.storage
            .put(Progress {
                article_id: "my-post".into(),
                scroll_position: 2.0,
                percentage: 66.7,
                last_read: 0,
            })
            .await
            .unwrap();
        open(ctx, rx).await
    }

    #[tokio::test]
    async fn starting_over_clears_the_stored_position() {
        let mut app = with_stored_position().await;
        assert_eq!(app.input_mode(), InputMode::ResumePrompt);
        app.handle_action(AppAction::StartOver).await.unwrap();
        assert_eq!(app.scroll, 0);
        assert_eq!(app.input_mode(), InputMode::Reading);

        let stored = app.session.ctx.storage.one::<Progress>("my-post").await.unwrap().unwrap();
        assert_eq!(stored.scroll_position, 0.0);
        assert!(!app.session.tracker.always_resume().await);

        app.poll_notices();
        let (notice, _) = app.notice.as_ref().unwrap();
        assert_eq!(notice.message, "Starting from the top");
    }

    #[tokio::test]
    async fn stored_position_prompts_to_resume() {
        let mut app = with_stored_position().await;
        assert_eq!(app.input_mode(), InputMode::ResumePrompt);
        app.handle_action(AppAction::AlwaysResume).await.unwrap();
        assert_eq!(app.scroll, 2);
        assert_eq!(app.percentage(), 66.7);
        assert_eq!(app.input_mode(), InputMode::Reading);
        assert!(app.session.tracker.always_resume().await);
    }

    #[tokio::test]
    async fn notices_reach_the_footer() {
        let mut app = app().await;
        app.session.ctx.notify(NoticeLevel::Error, "Storage is full");
        app.poll_notices();
        let (notice, _) = app.notice.as_ref().unwrap();
        assert_eq!(notice.message, "Storage is full");
    }
}
