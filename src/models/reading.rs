use serde::{Deserialize, Serialize};

/// Scroll position and completion for one article. One row per article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub article_id: String,
    pub scroll_position: f64,
    pub percentage: f64,
    /// Epoch milliseconds.
    pub last_read: i64,
}

/// Cumulative reading time and completion for one article. One row per article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub article_id: String,
    /// Seconds.
    pub total_time_spent: u64,
    pub percentage: f64,
    /// Epoch milliseconds.
    pub last_visit: i64,
    pub completed: bool,
}
