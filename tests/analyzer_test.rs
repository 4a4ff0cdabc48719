// tests/analyzer_test.rs
//! Orchestration behavior of `ReceiptAnalyzer` against scripted providers:
//! success short-circuit, quota retry and model advance, invalid-key
//! credential skip, fallback invocation, and total exhaustion.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticket_scan::errors::{ProviderError, ScanError};
use ticket_scan::models::Brand;
use ticket_scan::services::analyzer::{AnalyzerConfig, ReceiptAnalyzer};
use ticket_scan::services::gemini::VisionModel;
use ticket_scan::services::groq::FallbackModel;

const GEMINI_JSON: &str = r#"{"invoiceNumber":"1053 753779","rawDate":"02-Jun-25","rawCustomerName":"Nombre: ALEJANDRA DE LA CRUZ FAJARDO","items":[{"brand":"samsung","price":6837.0}]}"#;

const GROQ_JSON: &str = r#"{"invoiceNumber":"801190","date":"2025-06-02","customerName":"ALEJANDRA DE LA CRUZ FAJARDO","items":[{"brand":"LG","price":4999.0}]}"#;

struct ScriptedVision {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedVision {
    fn new(responses: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        _image_b64: &str,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((api_key.to_string(), model.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Provider("script exhausted".to_string())))
    }
}

struct ScriptedFallback {
    response: Mutex<Option<Result<String, ProviderError>>>,
    calls: Mutex<usize>,
}

impl ScriptedFallback {
    fn new(response: Result<String, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(response)),
            calls: Mutex::new(0),
        })
    }

    fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FallbackModel for ScriptedFallback {
    async fn complete(&self, _image_b64: &str) -> Result<String, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(ProviderError::Provider("script exhausted".to_string())))
    }
}

fn config(keys: &[&str], models: &[&str], max_retries: u32) -> AnalyzerConfig {
    AnalyzerConfig {
        api_keys: keys.iter().map(|k| k.to_string()).collect(),
        models: models.iter().map(|m| m.to_string()).collect(),
        max_retries,
        backoff_base: Duration::from_millis(10),
        fallback_key: None,
    }
}

fn quota() -> Result<String, ProviderError> {
    Err(ProviderError::Quota("429 resource exhausted".to_string()))
}

#[tokio::test(start_paused = true)]
async fn first_parseable_response_short_circuits_the_walk() {
    let primary = ScriptedVision::new(vec![Ok(GEMINI_JSON.to_string())]);
    let fallback = ScriptedFallback::new(Ok(GROQ_JSON.to_string()));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1", "k2"], &["flash", "pro"], 2),
        primary.clone(),
        fallback.clone(),
    );

    let result = analyzer.analyze(b"jpeg").await.unwrap();

    assert_eq!(primary.calls().len(), 1);
    assert_eq!(fallback.call_count(), 0);
    assert_eq!(result.invoice_number.as_deref(), Some("1053 753779"));
    assert_eq!(result.date.as_deref(), Some("2025-06-02"));
    assert_eq!(
        result.customer_name.as_deref(),
        Some("ALEJANDRA DE LA CRUZ FAJARDO")
    );
    assert_eq!(result.items[0].brand, Brand::Samsung);
    assert_eq!(result.items[0].price, 6837.0);
}

#[tokio::test(start_paused = true)]
async fn quota_is_retried_then_the_next_model_is_tried() {
    // flash: quota on both attempts, then pro succeeds on its first.
    let primary = ScriptedVision::new(vec![quota(), quota(), Ok(GEMINI_JSON.to_string())]);
    let fallback = ScriptedFallback::new(Ok(GROQ_JSON.to_string()));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1"], &["flash", "pro"], 2),
        primary.clone(),
        fallback.clone(),
    );

    analyzer.analyze(b"jpeg").await.unwrap();

    assert_eq!(
        primary.calls(),
        vec![
            ("k1".to_string(), "flash".to_string()),
            ("k1".to_string(), "flash".to_string()),
            ("k1".to_string(), "pro".to_string()),
        ]
    );
    assert_eq!(fallback.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn quota_backoff_doubles_between_attempts() {
    // One key, one model, three attempts, all quota: sleeps of 10ms and
    // 20ms under the paused clock before the fallback is consulted.
    let primary = ScriptedVision::new(vec![quota(), quota(), quota()]);
    let fallback = ScriptedFallback::new(Err(ProviderError::Provider("down".to_string())));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1"], &["flash"], 3),
        primary.clone(),
        fallback.clone(),
    );

    let started = tokio::time::Instant::now();
    let err = analyzer.analyze(b"jpeg").await.unwrap_err();

    assert_eq!(primary.calls().len(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(30));
    assert!(matches!(err, ScanError::AnalysisExhausted { .. }));
}

#[tokio::test(start_paused = true)]
async fn invalid_key_skips_remaining_models_of_that_credential() {
    let primary = ScriptedVision::new(vec![
        Err(ProviderError::InvalidKey("API key not valid".to_string())),
        Ok(GEMINI_JSON.to_string()),
    ]);
    let fallback = ScriptedFallback::new(Ok(GROQ_JSON.to_string()));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["bad", "good"], &["flash", "pro"], 2),
        primary.clone(),
        fallback.clone(),
    );

    analyzer.analyze(b"jpeg").await.unwrap();

    // "bad" never reaches the pro model; "good" is tried immediately.
    assert_eq!(
        primary.calls(),
        vec![
            ("bad".to_string(), "flash".to_string()),
            ("good".to_string(), "flash".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn fallback_is_invoked_once_after_primary_exhaustion() {
    let primary = ScriptedVision::new(vec![
        Err(ProviderError::Provider("model not found".to_string())),
        Err(ProviderError::Provider("internal error".to_string())),
    ]);
    let fallback = ScriptedFallback::new(Ok(GROQ_JSON.to_string()));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1"], &["flash", "pro"], 2),
        primary.clone(),
        fallback.clone(),
    );

    let result = analyzer.analyze(b"jpeg").await.unwrap();

    assert_eq!(primary.calls().len(), 2);
    assert_eq!(fallback.call_count(), 1);
    assert_eq!(result.invoice_number.as_deref(), Some("801190"));
    // Unknown brand from the fallback still collapses to Otro.
    assert_eq!(result.items[0].brand, Brand::Otro);
}

#[tokio::test(start_paused = true)]
async fn unparseable_primary_response_advances_to_next_model() {
    let primary = ScriptedVision::new(vec![
        Ok("sorry, I cannot read this receipt".to_string()),
        Ok(GEMINI_JSON.to_string()),
    ]);
    let fallback = ScriptedFallback::new(Err(ProviderError::Provider("down".to_string())));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1"], &["flash", "pro"], 2),
        primary.clone(),
        fallback.clone(),
    );

    analyzer.analyze(b"jpeg").await.unwrap();

    assert_eq!(
        primary.calls(),
        vec![
            ("k1".to_string(), "flash".to_string()),
            ("k1".to_string(), "pro".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn total_exhaustion_reports_every_failure_reason() {
    let primary = ScriptedVision::new(vec![]);
    let fallback = ScriptedFallback::new(Err(ProviderError::Provider(
        "GROQ_API_KEY not configured".to_string(),
    )));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&[], &["flash"], 2),
        primary.clone(),
        fallback.clone(),
    );

    let err = analyzer.analyze(b"jpeg").await.unwrap_err();

    assert_eq!(primary.calls().len(), 0);
    assert_eq!(fallback.call_count(), 1);
    match err {
        ScanError::AnalysisExhausted { report } => {
            assert!(report.contains("no API keys configured"));
            assert!(report.contains("GROQ_API_KEY not configured"));
        }
        other => panic!("expected AnalysisExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn exhaustion_report_distinguishes_quota_from_invalid_key() {
    let primary = ScriptedVision::new(vec![
        quota(),
        quota(), // k1/flash: quota exhausted
        Err(ProviderError::Provider("unsupported model".to_string())), // k1/pro
        Err(ProviderError::InvalidKey("API key expired".to_string())), // k2
    ]);
    let fallback = ScriptedFallback::new(Err(ProviderError::Provider("down".to_string())));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1", "k2"], &["flash", "pro"], 2),
        primary.clone(),
        fallback.clone(),
    );

    let err = analyzer.analyze(b"jpeg").await.unwrap_err();

    match err {
        ScanError::AnalysisExhausted { report } => {
            assert!(report.contains("key #1 / flash: quota exhausted"));
            assert!(report.contains("key #2: invalid API key"));
            assert!(report.contains("fallback:"));
        }
        other => panic!("expected AnalysisExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_image_is_rejected_before_any_provider_call() {
    let primary = ScriptedVision::new(vec![Ok(GEMINI_JSON.to_string())]);
    let fallback = ScriptedFallback::new(Ok(GROQ_JSON.to_string()));
    let analyzer = ReceiptAnalyzer::with_clients(
        config(&["k1"], &["flash"], 2),
        primary.clone(),
        fallback.clone(),
    );

    let err = analyzer.analyze(b"").await.unwrap_err();

    assert!(matches!(err, ScanError::Validation(_)));
    assert_eq!(primary.calls().len(), 0);
    assert_eq!(fallback.call_count(), 0);
}
