// src/services/mod.rs
pub mod analyzer;
pub mod gemini;
pub mod groq;
pub mod image_processor;
pub mod normalize;

pub use analyzer::{AnalyzerConfig, ReceiptAnalyzer};
pub use gemini::{GeminiClient, VisionModel};
pub use groq::{FallbackModel, GroqClient};
pub use image_processor::ImageProcessor;
