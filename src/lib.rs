// src/lib.rs
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use crate::services::{ImageProcessor, ReceiptAnalyzer};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<ReceiptAnalyzer>,
    pub image_processor: Arc<ImageProcessor>,
}
