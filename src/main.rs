// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::{info, warn};
use std::sync::Arc;
use ticket_scan::AppState;
use ticket_scan::handlers::{analyze_receipt, health_check};
use ticket_scan::services::{AnalyzerConfig, ImageProcessor, ReceiptAnalyzer};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting ticket-scan service...");

    let config = AnalyzerConfig::from_env();
    if config.api_keys.is_empty() {
        warn!("no GEMINI_API_KEY_* configured; every scan will go straight to the fallback provider");
    }
    if config.fallback_key.is_none() {
        warn!("no GROQ_API_KEY configured; the fallback phase will fail closed");
    }

    let app_state = AppState {
        analyzer: Arc::new(ReceiptAnalyzer::new(config)),
        image_processor: Arc::new(ImageProcessor::new()),
    };

    info!("Starting HTTP server on 0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .service(web::scope("/api/v1").route("/analyze", web::post().to(analyze_receipt)))
            .route("/health", web::get().to(health_check))
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await?;

    Ok(())
}
