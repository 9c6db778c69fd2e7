use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::DecodeMode;
use crate::util::parse_bool_flag;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// How the assistant reply is requested from the answer service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// `POST /ask/stream`, reply applied fragment by fragment.
    #[default]
    Streaming,
    /// `POST /ask`, reply applied once as a whole.
    Whole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub response_mode: ResponseMode,
    #[serde(skip)]
    pub decode_mode: DecodeMode,
    pub log_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = std::env::var("ASK_API_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let streaming = std::env::var("ASK_STREAMING")
            .ok()
            .and_then(parse_bool_flag)
            .unwrap_or(true);
        let strict_utf8 = std::env::var("ASK_STRICT_UTF8")
            .ok()
            .and_then(parse_bool_flag)
            .unwrap_or(false);
        let log_path = std::env::var("ASK_LOG_PATH")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_url,
            response_mode: if streaming {
                ResponseMode::Streaming
            } else {
                ResponseMode::Whole
            },
            decode_mode: if strict_utf8 {
                DecodeMode::Strict
            } else {
                DecodeMode::Lenient
            },
            log_path,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid ASK_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }
        if reqwest::Url::parse(&self.api_url).is_err() {
            bail!("Invalid ASK_API_URL '{}': not a valid URL", self.api_url);
        }
        Ok(())
    }
}
