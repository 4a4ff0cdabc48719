// src/handlers.rs
use crate::{AppState, errors::ScanError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use std::time::Instant;
use uuid::Uuid;

/// `POST /api/v1/analyze` — multipart upload of one receipt photo.
///
/// Analysis failure is never fatal to the sale itself: the 503 body carries
/// the per-attempt report and the form drops back to manual entry.
pub async fn analyze_receipt(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let started = Instant::now();

    // First non-empty field wins; the form uploads a single photo.
    let mut image_data: Vec<u8> = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let mut buf = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        if !buf.is_empty() {
            image_data = buf;
            break;
        }
    }

    if image_data.is_empty() {
        return Err(ScanError::Validation("no receipt image in upload".to_string()).into());
    }

    let jpeg = data.image_processor.prepare_jpeg(&image_data)?;
    let image_bytes = jpeg.len();

    let result = data.analyzer.analyze(&jpeg).await?;

    let scan = ScannedReceipt {
        id: Uuid::new_v4(),
        result,
        metadata: ScanMetadata {
            processing_time_ms: started.elapsed().as_millis() as u64,
            image_bytes,
        },
        created_at: chrono::Utc::now(),
    };

    Ok(HttpResponse::Ok().json(scan))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "ticket-scan",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
