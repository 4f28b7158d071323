use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::document::SerializedRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Pink,
    Blue,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 4] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Pink,
        HighlightColor::Blue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Pink => "pink",
            HighlightColor::Blue => "blue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub article_id: String,
    pub text: String,
    pub color: HighlightColor,
    pub position: SerializedRange,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Highlight {
    pub fn new(
        article_id: &str,
        text: String,
        color: HighlightColor,
        position: SerializedRange,
    ) -> Self {
        let created_at = Utc::now().timestamp_millis();
        Self {
            id: new_highlight_id(created_at),
            article_id: article_id.to_string(),
            text,
            color,
            position,
            created_at,
        }
    }

    pub fn created_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.created_at)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Time-based id with a random suffix, e.g. `hl-1760885000000-k3v9q2`.
fn new_highlight_id(created_at: i64) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("hl-{created_at}-{suffix}")
}
