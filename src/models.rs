// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phone manufacturers the counter actually stocks. Anything the model
/// extracts outside this set collapses to `Otro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Brand {
    Samsung,
    Apple,
    Oppo,
    Zte,
    Motorola,
    Realme,
    Vivo,
    Xiaomi,
    Honor,
    Huawei,
    Senwa,
    Nubia,
    Otro,
}

impl Brand {
    /// Case-insensitive, whitespace-tolerant match against the known set.
    pub fn normalize(raw: &str) -> Brand {
        match raw.trim().to_uppercase().as_str() {
            "SAMSUNG" => Brand::Samsung,
            "APPLE" => Brand::Apple,
            "OPPO" => Brand::Oppo,
            "ZTE" => Brand::Zte,
            "MOTOROLA" => Brand::Motorola,
            "REALME" => Brand::Realme,
            "VIVO" => Brand::Vivo,
            "XIAOMI" => Brand::Xiaomi,
            "HONOR" => Brand::Honor,
            "HUAWEI" => Brand::Huawei,
            "SENWA" => Brand::Senwa,
            "NUBIA" => Brand::Nubia,
            _ => Brand::Otro,
        }
    }
}

/// One detected phone line item, price already discount-adjusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub brand: Brand,
    pub price: f64,
}

/// The cleaned extraction the sales form merges into its own state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptAnalysis {
    pub invoice_number: Option<String>,
    /// `YYYY-MM-DD` when the raw text matched a known pattern, otherwise the
    /// extracted text verbatim.
    pub date: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}

/// What the vision models are asked to return. Accepts both the primary
/// provider's raw field names (`rawDate`, `rawCustomerName`) and the
/// fallback's cleaned ones; cleaning runs uniformly over either.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtraction {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default, alias = "rawDate")]
    pub date: Option<String>,
    #[serde(default, alias = "rawCustomerName")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: f64,
    /// Some model revisions volunteer the discount line separately instead
    /// of pre-subtracting it.
    #[serde(default)]
    pub discount: Option<f64>,
}

/// Response envelope for one scanned receipt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedReceipt {
    pub id: Uuid,
    pub result: ReceiptAnalysis,
    pub metadata: ScanMetadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub processing_time_ms: u64,
    /// Size of the re-encoded JPEG actually sent to the providers.
    pub image_bytes: usize,
}
