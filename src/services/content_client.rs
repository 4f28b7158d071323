use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str = concat!("folio-reader/", env!("CARGO_PKG_VERSION"));

/// Loads JSON documents from the web or the local filesystem, caching each
/// source after the first successful load.
pub struct ContentClient {
    client: Client,
    cache: Mutex<HashMap<String, Value>>,
}

enum Source {
    Remote(Url),
    Local(PathBuf),
}

impl ContentClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// `None` on any failure; the reason goes to the log.
    pub async fn load_json(&self, source: &str) -> Option<Value> {
        if let Some(cached) = self.cache.lock().await.get(source) {
            return Some(cached.clone());
        }

        match self.fetch(source).await {
            Ok(value) => {
                self.cache
                    .lock()
                    .await
                    .insert(source.to_string(), value.clone());
                Some(value)
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "failed to load JSON");
                None
            }
        }
    }

    async fn fetch(&self, source: &str) -> Result<Value> {
        match classify(source)? {
            Source::Remote(url) => {
                let mut headers = HeaderMap::new();
                headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

                let response = self.client.get(url).headers(headers).send().await?;
                if !response.status().is_success() {
                    return Err(
                        anyhow::anyhow!("Failed to fetch {source}: HTTP {}", response.status()).into(),
                    );
                }
                Ok(response.json().await?)
            }
            Source::Local(path) => {
                let content = tokio::fs::read_to_string(&path).await?;
                Ok(serde_json::from_str(&content)?)
            }
        }
    }
}

fn classify(source: &str) -> Result<Source> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Source::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Source::Local)
            .map_err(|_| AppError::Document(format!("not a local file URL: {source}"))),
        // Anything else, including Windows drive letters that parse as a scheme.
        _ => Ok(Source::Local(PathBuf::from(source))),
    }
}
