use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Article content as served by the site: an optional id and title, and the
/// body as a tree of node specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element {
        tag: String,
        #[serde(default)]
        class: Option<String>,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
}

impl Article {
    /// Parses article JSON, deriving the id from `source` when the payload has none.
    pub fn from_json(value: serde_json::Value, source: &str) -> Result<Self> {
        let mut article: Article = serde_json::from_value(value)?;
        if article.id.trim().is_empty() {
            article.id = derive_article_id(source)
                .ok_or_else(|| AppError::Document(format!("cannot derive article id from {source}")))?;
        }
        Ok(article)
    }
}

fn derive_article_id(source: &str) -> Option<String> {
    let last_segment = match Url::parse(source) {
        Ok(url) if url.scheme() != "file" => url
            .path_segments()?
            .rfind(|s| !s.is_empty())
            .map(str::to_string)?,
        Ok(url) => url.to_file_path().ok()?.file_name()?.to_string_lossy().to_string(),
        Err(_) => Path::new(source).file_name()?.to_string_lossy().to_string(),
    };
    let stem = Path::new(&last_segment).file_stem()?.to_string_lossy().to_string();
    (!stem.is_empty()).then_some(stem)
}
