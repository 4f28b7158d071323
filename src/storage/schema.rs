pub const SCHEMA: &str = r#"
-- highlights table (append-only, many rows per article)
CREATE TABLE IF NOT EXISTS highlights (
    id TEXT PRIMARY KEY,
    article_id TEXT NOT NULL,
    text TEXT NOT NULL,
    color TEXT NOT NULL,
    position TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_highlights_article_id ON highlights(article_id);

-- progress table (one row per article)
CREATE TABLE IF NOT EXISTS progress (
    article_id TEXT PRIMARY KEY,
    scroll_position REAL NOT NULL DEFAULT 0,
    percentage REAL NOT NULL DEFAULT 0,
    last_read INTEGER NOT NULL
);

-- stats table (one row per article)
CREATE TABLE IF NOT EXISTS stats (
    article_id TEXT PRIMARY KEY,
    total_time_spent INTEGER NOT NULL DEFAULT 0,
    percentage REAL NOT NULL DEFAULT 0,
    last_visit INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0
);
"#;
