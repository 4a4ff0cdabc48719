// src/services/analyzer.rs
//! Receipt extraction orchestration: walk every configured credential and
//! candidate model in priority order, retry quota hits with exponential
//! backoff, then hand the image to the fallback vendor before giving up.

use crate::errors::{ProviderError, ScanError};
use crate::models::ReceiptAnalysis;
use crate::services::gemini::{GeminiClient, VisionModel};
use crate::services::groq::{FallbackModel, GroqClient};
use crate::services::normalize::parse_receipt_json;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MODELS: [&str; 2] = ["gemini-1.5-flash-latest", "gemini-1.5-pro-latest"];

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_MS: u64 = 2_000;
// One primary key plus up to five secondaries.
const MAX_PRIMARY_KEYS: usize = 6;

/// Everything the walk needs, resolved once at startup and injected.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Primary-provider credentials, in priority order. Empty is allowed:
    /// the primary phase is skipped and the fallback gets the image directly.
    pub api_keys: Vec<String>,
    /// Candidate model identifiers, in priority order.
    pub models: Vec<String>,
    /// Attempts per credential/model pair on quota errors.
    pub max_retries: u32,
    /// First backoff sleep; doubles on each further attempt.
    pub backoff_base: Duration,
    pub fallback_key: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_MS),
            fallback_key: None,
        }
    }
}

impl AnalyzerConfig {
    /// Reads `GEMINI_API_KEY_1..=GEMINI_API_KEY_6` (absent ones skipped),
    /// an optional comma-separated `GEMINI_MODELS` override, `GROQ_API_KEY`,
    /// and the tunables `ANALYZER_MAX_RETRIES` / `ANALYZER_BACKOFF_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_keys: Vec<String> = (1..=MAX_PRIMARY_KEYS)
            .filter_map(|i| std::env::var(format!("GEMINI_API_KEY_{i}")).ok())
            .filter(|key| !key.is_empty())
            .collect();

        let models = std::env::var("GEMINI_MODELS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .unwrap_or(defaults.models);

        let max_retries = std::env::var("ANALYZER_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES)
            .max(1);

        let backoff_base = std::env::var("ANALYZER_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff_base);

        let fallback_key = std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());

        Self {
            api_keys,
            models,
            max_retries,
            backoff_base,
            fallback_key,
        }
    }
}

pub struct ReceiptAnalyzer {
    config: AnalyzerConfig,
    primary: Arc<dyn VisionModel>,
    fallback: Arc<dyn FallbackModel>,
}

impl ReceiptAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let fallback_key = config.fallback_key.clone();
        Self {
            config,
            primary: Arc::new(GeminiClient::new()),
            fallback: Arc::new(GroqClient::new(fallback_key)),
        }
    }

    /// Seam for tests and alternative providers.
    pub fn with_clients(
        config: AnalyzerConfig,
        primary: Arc<dyn VisionModel>,
        fallback: Arc<dyn FallbackModel>,
    ) -> Self {
        Self {
            config,
            primary,
            fallback,
        }
    }

    /// Extract structured receipt fields from a JPEG photo.
    ///
    /// The first parseable response wins and ends the walk immediately. The
    /// terminal error carries one report line per failed credential/model
    /// combination so the form can show the seller something actionable
    /// (quota vs bad key vs technical) before they fall back to typing the
    /// sale in by hand.
    pub async fn analyze(&self, image: &[u8]) -> Result<ReceiptAnalysis, ScanError> {
        if image.is_empty() {
            return Err(ScanError::Validation("empty receipt image".to_string()));
        }

        let image_b64 = general_purpose::STANDARD.encode(image);
        let mut report: Vec<String> = Vec::new();

        if self.config.api_keys.is_empty() {
            warn!("no primary API keys configured, going straight to fallback");
            report.push("primary: no API keys configured".to_string());
        }

        'keys: for (key_index, api_key) in self.config.api_keys.iter().enumerate() {
            let key_no = key_index + 1;
            for model in &self.config.models {
                let mut attempt = 0;
                while attempt < self.config.max_retries {
                    debug!("key #{key_no} | model {model} | attempt {}", attempt + 1);

                    let outcome = self
                        .primary
                        .complete(api_key, model, &image_b64)
                        .await
                        .and_then(|text| parse_receipt_json(&text));

                    match outcome {
                        Ok(result) => {
                            info!("extraction succeeded with key #{key_no}, model {model}");
                            return Ok(result);
                        }
                        Err(ProviderError::Quota(msg)) => {
                            attempt += 1;
                            if attempt < self.config.max_retries {
                                let delay = backoff_delay(self.config.backoff_base, attempt - 1);
                                warn!("key #{key_no} | {model}: quota hit, backing off {delay:?}");
                                tokio::time::sleep(delay).await;
                            } else {
                                warn!(
                                    "key #{key_no} | {model}: quota still exhausted after {} attempts",
                                    self.config.max_retries
                                );
                                report.push(format!(
                                    "key #{key_no} / {model}: quota exhausted ({msg})"
                                ));
                                break;
                            }
                        }
                        Err(ProviderError::InvalidKey(msg)) => {
                            warn!("key #{key_no}: invalid credential, skipping its remaining models");
                            report.push(format!("key #{key_no}: invalid API key ({msg})"));
                            continue 'keys;
                        }
                        Err(err) => {
                            // Parse failures and other provider errors get no
                            // retry, just the next candidate model.
                            warn!("key #{key_no} | {model}: {err}");
                            report.push(format!("key #{key_no} / {model}: {err}"));
                            break;
                        }
                    }
                }
            }
        }

        info!("all primary attempts failed, invoking fallback provider");
        match self
            .fallback
            .complete(&image_b64)
            .await
            .and_then(|text| parse_receipt_json(&text))
        {
            Ok(result) => {
                info!("fallback provider rescued the extraction");
                Ok(result)
            }
            Err(err) => {
                report.push(format!("fallback: {err}"));
                Err(ScanError::AnalysisExhausted {
                    report: report.join("\n"),
                })
            }
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(8));
    }

    #[test]
    fn default_config_has_both_candidate_models() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0], "gemini-1.5-flash-latest");
        assert_eq!(config.max_retries, 2);
    }
}
