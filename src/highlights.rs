//! Saving, restoring, removing and exporting text highlights for one article.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Document, TextRange};
use crate::error::Result;
use crate::models::{Highlight, HighlightColor};
use crate::session::{NoticeLevel, SessionContext};
use crate::storage::Table;

/// Snapshot written to `highlights-<articleId>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightExport {
    pub article: String,
    pub export_date: String,
    pub storage_type: String,
    pub highlights: Vec<ExportedHighlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedHighlight {
    pub text: String,
    pub color: HighlightColor,
    pub created_at: String,
}

pub struct HighlightEngine {
    ctx: SessionContext,
    color: HighlightColor,
}

impl HighlightEngine {
    pub fn new(ctx: SessionContext) -> Self {
        let color = ctx.options.default_color;
        Self { ctx, color }
    }

    pub fn color(&self) -> HighlightColor {
        self.color
    }

    pub fn set_color(&mut self, color: HighlightColor) {
        self.color = color;
    }

    /// A selection qualifies when its trimmed text is long enough and it sits
    /// entirely inside the content container.
    pub fn is_eligible(&self, document: &Document, range: &TextRange) -> bool {
        let Some(text) = document.range_text(range) else {
            return false;
        };
        text.trim().chars().count() >= self.ctx.options.min_selection_chars
            && document.is_in_content(range)
    }

    /// Persists a highlight for `range` in the active color. The document is
    /// not touched; see [`HighlightEngine::apply`].
    pub async fn save_highlight(
        &self,
        document: &Document,
        text: &str,
        range: &TextRange,
    ) -> Option<Highlight> {
        let Some(position) = document.serialize_range(range) else {
            tracing::debug!(article = %self.ctx.article_id, "selection cannot be serialized");
            return None;
        };
        let highlight = Highlight::new(&self.ctx.article_id, text.to_string(), self.color, position);

        match self.ctx.storage.put(highlight.clone()).await {
            Ok(()) => {
                tracing::debug!(id = %highlight.id, color = %highlight.color, "highlight saved");
                Some(highlight)
            }
            Err(e) => {
                self.ctx.report_write_failure("highlight", &e);
                None
            }
        }
    }

    /// Wraps the highlight's range in a marker. Already-shown highlights count as applied.
    pub fn apply(&self, document: &mut Document, highlight: &Highlight) -> bool {
        if document.has_highlight(&highlight.id) {
            return true;
        }
        let Some(range) = document.resolve(&highlight.position) else {
            tracing::debug!(id = %highlight.id, "highlight path no longer resolves");
            return false;
        };
        if document.range_text(&range).as_deref() != Some(highlight.text.as_str()) {
            tracing::debug!(id = %highlight.id, "highlight text no longer matches");
            return false;
        }
        match document.wrap_range(&range, &highlight.id, highlight.color) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(id = %highlight.id, error = %e, "highlight cannot be wrapped");
                false
            }
        }
    }

    /// Selection-to-highlight flow: eligibility check, save, then display.
    pub async fn highlight_selection(
        &self,
        document: &mut Document,
        range: &TextRange,
    ) -> Option<Highlight> {
        if !self.is_eligible(document, range) {
            return None;
        }
        let text = document.range_text(range)?;
        let highlight = self.save_highlight(document, &text, range).await?;
        if !self.apply(document, &highlight) {
            self.ctx
                .notify(NoticeLevel::Info, "Highlight saved but could not be displayed");
        }
        Some(highlight)
    }

    /// Reads every highlight of the article and re-displays the ones whose
    /// ranges still resolve, oldest first.
    pub async fn load_highlights(&self, document: &mut Document) -> Vec<Highlight> {
        let rows: Vec<Highlight> = match self.ctx.storage.all(&self.ctx.article_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(article = %self.ctx.article_id, error = %e, "failed to load highlights");
                return Vec::new();
            }
        };

        let restored = rows.iter().filter(|h| self.apply(document, h)).count();
        tracing::info!(
            article = %self.ctx.article_id,
            total = rows.len(),
            restored,
            "highlights loaded"
        );
        rows
    }

    /// Unwraps the marker and deletes the stored row.
    pub async fn remove_highlight(&self, document: &mut Document, highlight_id: &str) -> bool {
        let removed = document.unwrap_highlight(highlight_id);
        if let Err(e) = self
            .ctx
            .storage
            .delete(Table::Highlights, &self.ctx.article_id, highlight_id)
            .await
        {
            tracing::warn!(id = highlight_id, error = %e, "failed to delete highlight");
        }
        removed
    }

    /// Read-only report of the article's highlights.
    pub async fn export_highlights(&self) -> Result<HighlightExport> {
        let rows: Vec<Highlight> = self.ctx.storage.all(&self.ctx.article_id).await?;
        Ok(HighlightExport {
            article: self.ctx.article_id.to_string(),
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            storage_type: self.ctx.storage.storage_type().to_string(),
            highlights: rows
                .into_iter()
                .map(|h| ExportedHighlight {
                    created_at: h
                        .created_at_utc()
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                    text: h.text,
                    color: h.color,
                })
                .collect(),
        })
    }

    pub fn export_file_name(&self) -> String {
        format!("highlights-{}.json", urlencoding::encode(&self.ctx.article_id))
    }

    /// Writes the export into `dir`, falling back to the temp directory.
    /// The outcome is reported as a notice either way.
    pub async fn export_to(&self, dir: &Path) -> Option<PathBuf> {
        let export = match self.export_highlights().await {
            Ok(export) => export,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read highlights for export");
                self.ctx.notify(NoticeLevel::Error, "Export failed");
                return None;
            }
        };

        let file_name = self.export_file_name();
        for target in [dir.to_path_buf(), std::env::temp_dir()] {
            match write_json(&target, &file_name, &export).await {
                Ok(path) => {
                    self.ctx.notify(
                        NoticeLevel::Success,
                        format!("Exported {} highlights to {}", export.highlights.len(), path.display()),
                    );
                    return Some(path);
                }
                Err(e) => {
                    tracing::warn!(dir = %target.display(), error = %e, "export write failed");
                }
            }
        }

        self.ctx.notify(NoticeLevel::Error, "Export failed");
        None
    }
}

async fn write_json(dir: &Path, file_name: &str, export: &HighlightExport) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, serde_json::to_vec_pretty(export)?).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::sample_document;
    use crate::document::{Boundary, Node};
    use crate::session::tests::memory_context;
    use crate::storage::Storage;

    fn range(start: &[usize], so: usize, end: &[usize], eo: usize) -> TextRange {
        TextRange {
            start: Boundary::new(start.to_vec(), so),
            end: Boundary::new(end.to_vec(), eo),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_text_and_color() {
        let (ctx, _rx) = memory_context("my-post");
        let mut engine = HighlightEngine::new(ctx.clone());
        engine.set_color(HighlightColor::Green);

        let doc = sample_document();
        let r = range(&[1, 0, 0], 0, &[1, 0, 0], 11);
        let saved = engine.save_highlight(&doc, "Hello world", &r).await.unwrap();
        assert_eq!(saved.article_id, "my-post");
        assert_eq!(saved.color, HighlightColor::Green);

        // reload: a fresh document gets the highlight back
        let mut reloaded = sample_document();
        let rows = engine.load_highlights(&mut reloaded).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "Hello world");
        assert_eq!(rows[0].color, HighlightColor::Green);
        assert!(reloaded.has_highlight(&saved.id));
        assert_eq!(reloaded.node_at(&[1, 0, 1, 0]), Some(&Node::Text("Hello world".into())));

        // other articles see nothing
        let (other_ctx, _rx) = SessionContext::new(
            "other-post",
            ctx.storage.clone(),
            ctx.preferences.clone(),
            ctx.options.clone(),
        );
        let other = HighlightEngine::new(other_ctx);
        assert!(other.load_highlights(&mut sample_document()).await.is_empty());
    }

    #[tokio::test]
    async fn loading_twice_is_idempotent() {
        let (ctx, _rx) = memory_context("my-post");
        let engine = HighlightEngine::new(ctx.clone());
        let mut doc = sample_document();
        engine
            .highlight_selection(&mut doc, &range(&[1, 0, 0], 6, &[1, 0, 0], 11))
            .await
            .unwrap();

        let mut reloaded = sample_document();
        engine.load_highlights(&mut reloaded).await;
        let once = reloaded.clone();
        let rows = engine.load_highlights(&mut reloaded).await;

        assert_eq!(rows.len(), 1);
        assert_eq!(reloaded, once);
        assert_eq!(ctx.storage.all::<Highlight>("my-post").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn later_highlights_restore_against_earlier_markers() {
        let (ctx, _rx) = memory_context("my-post");
        let engine = HighlightEngine::new(ctx);
        let mut doc = sample_document();
        let first = engine
            .highlight_selection(&mut doc, &range(&[1, 0, 0], 0, &[1, 0, 0], 5))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        // after the first marker the tail text sits at [1, 0, 2]
        let second = engine
            .highlight_selection(&mut doc, &range(&[1, 0, 2], 1, &[1, 0, 2], 6))
            .await
            .unwrap();
        assert_eq!(second.text, "world");

        let mut reloaded = sample_document();
        engine.load_highlights(&mut reloaded).await;
        assert!(reloaded.has_highlight(&first.id));
        assert!(reloaded.has_highlight(&second.id));
    }

    #[tokio::test]
    async fn stale_or_mismatched_paths_are_skipped() {
        let (ctx, _rx) = memory_context("my-post");
        let engine = HighlightEngine::new(ctx.clone());
        let doc = sample_document();
        let position = doc
            .serialize_range(&range(&[1, 0, 0], 0, &[1, 0, 0], 11))
            .unwrap();

        let mut stale = Highlight::new("my-post", "Hello world".into(), HighlightColor::Yellow, position.clone());
        stale.id = "hl-stale".into();
        stale.position.start_path = vec![1, 5, 0];
        ctx.storage.put(stale).await.unwrap();

        let mut edited = Highlight::new("my-post", "Goodbye world".into(), HighlightColor::Yellow, position);
        edited.id = "hl-edited".into();
        ctx.storage.put(edited).await.unwrap();

        let mut reloaded = sample_document();
        let rows = engine.load_highlights(&mut reloaded).await;
        assert_eq!(rows.len(), 2);
        assert!(!reloaded.has_highlight("hl-stale"));
        assert!(!reloaded.has_highlight("hl-edited"));
        assert_eq!(reloaded, sample_document());
    }

    #[tokio::test]
    async fn highlights_made_after_a_removal_survive_reload() {
        let (ctx, _rx) = memory_context("my-post");
        let engine = HighlightEngine::new(ctx);
        let mut doc = sample_document();
        let hello = engine
            .highlight_selection(&mut doc, &range(&[1, 0, 0], 0, &[1, 0, 0], 5))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        // p > ["", mark, " world, this is ", em, " prose."]
        let prose = engine
            .highlight_selection(&mut doc, &range(&[1, 0, 4], 1, &[1, 0, 4], 6))
            .await
            .unwrap();
        assert_eq!(prose.text, "prose");
        assert!(engine.remove_highlight(&mut doc, &prose.id).await);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let world = engine
            .highlight_selection(&mut doc, &range(&[1, 0, 2], 1, &[1, 0, 2], 6))
            .await
            .unwrap();
        assert_eq!(world.text, "world");

        let mut reloaded = sample_document();
        let rows = engine.load_highlights(&mut reloaded).await;
        assert_eq!(rows.len(), 2);
        assert!(reloaded.has_highlight(&hello.id));
        assert!(reloaded.has_highlight(&world.id));
        assert_eq!(reloaded, doc);
    }

    #[tokio::test]
    async fn short_or_out_of_content_selections_are_ignored() {
        let (ctx, _rx) = memory_context("my-post");
        let engine = HighlightEngine::new(ctx.clone());
        let mut doc = sample_document();

        // "Hel" is three characters
        assert!(engine
            .highlight_selection(&mut doc, &range(&[1, 0, 0], 0, &[1, 0, 0], 3))
            .await
            .is_none());
        // the title lives outside the content container
        assert!(engine
            .highlight_selection(&mut doc, &range(&[0, 0, 0], 0, &[0, 0, 0], 5))
            .await
            .is_none());
        // "Hell" is enough
        assert!(engine
            .highlight_selection(&mut doc, &range(&[1, 0, 0], 0, &[1, 0, 0], 4))
            .await
            .is_some());
        assert_eq!(ctx.storage.all::<Highlight>("my-post").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removal_unwraps_and_deletes_the_row() {
        let (ctx, _rx) = memory_context("my-post");
        let engine = HighlightEngine::new(ctx.clone());
        let mut doc = sample_document();
        let saved = engine
            .highlight_selection(&mut doc, &range(&[1, 0, 0], 0, &[1, 0, 0], 11))
            .await
            .unwrap();

        assert!(engine.remove_highlight(&mut doc, &saved.id).await);
        assert!(!doc.has_highlight(&saved.id));
        assert!(ctx.storage.all::<Highlight>("my-post").await.unwrap().is_empty());

        let mut reloaded = sample_document();
        assert!(engine.load_highlights(&mut reloaded).await.is_empty());
    }

    #[tokio::test]
    async fn export_is_a_read_only_snapshot() {
        let (ctx, _rx) = memory_context("my-post");
        let mut engine = HighlightEngine::new(ctx.clone());
        engine.set_color(HighlightColor::Blue);
        let mut doc = sample_document();
        engine
            .highlight_selection(&mut doc, &range(&[1, 1, 0], 0, &[1, 1, 0], 6))
            .await
            .unwrap();

        let export = engine.export_highlights().await.unwrap();
        assert_eq!(export.article, "my-post");
        assert_eq!(export.storage_type, "memory");
        assert_eq!(export.highlights.len(), 1);
        assert_eq!(export.highlights[0].text, "Second");
        assert_eq!(export.highlights[0].color, HighlightColor::Blue);
        assert!(export.highlights[0].created_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&export.export_date).is_ok());

        let json = serde_json::to_value(&export).unwrap();
        assert!(json.get("exportDate").is_some());
        assert!(json.get("storageType").is_some());
        assert!(json["highlights"][0].get("createdAt").is_some());

        assert_eq!(ctx.storage.all::<Highlight>("my-post").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_falls_back_when_directory_is_unwritable() {
        let (ctx, mut rx) = SessionContext::new(
            "nested/post",
            Storage::in_memory(),
            memory_context("x").0.preferences,
            Default::default(),
        );
        let engine = HighlightEngine::new(ctx);
        assert_eq!(engine.export_file_name(), "highlights-nested%2Fpost.json");

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let written = engine.export_to(&blocker.join("exports")).await.unwrap();
        assert!(written.starts_with(std::env::temp_dir()));
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        let _ = std::fs::remove_file(written);
    }
}
