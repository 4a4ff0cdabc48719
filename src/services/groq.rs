// src/services/groq.rs
use crate::errors::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const FALLBACK_MODEL: &str = "llama-3.2-90b-vision-preview";

/// Independently specified prompt for the fallback vendor: cleaned fields,
/// same JSON shape, same discount and accessory rules.
const FALLBACK_PROMPT: &str = r#"You are an expert data extractor. Analyze this receipt image and extract the following in pure JSON format:
{
  "invoiceNumber": "The invoice/folio number printed by the register",
  "date": "YYYY-MM-DD",
  "customerName": "Customer name without label text",
  "items": [
    {
      "brand": "Brand name (SAMSUNG, APPLE, MOTOROLA, XIAOMI, OPPO, ZTE, HONOR, HUAWEI, REALME, VIVO, SENWA, NUBIA, OTRO)",
      "price": 1234.56
    }
  ]
}

IMPORTANT RULES:
1. Only extract mobile phones. Ignore accessories (chips, cases).
2. For the price: take the base price and subtract any package discount appearing immediately below it. Ignore discounts of 1.00 or less.
3. JSON ONLY. No markdown, no comments."#;

/// One-shot completion against the secondary vendor, used only after the
/// primary walk is exhausted.
#[async_trait]
pub trait FallbackModel: Send + Sync {
    async fn complete(&self, image_b64: &str) -> Result<String, ProviderError>;
}

pub struct GroqClient {
    client: Client,
    api_key: Option<String>,
}

impl GroqClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl FallbackModel for GroqClient {
    async fn complete(&self, image_b64: &str) -> Result<String, ProviderError> {
        // Fails closed when the key is absent; the reason lands in the
        // exhaustion report.
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderError::Provider("GROQ_API_KEY not configured".to_string())
        })?;

        let image_url = format!("data:image/jpeg;base64,{image_b64}");

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&json!({
                "model": FALLBACK_MODEL,
                "temperature": 0,
                "response_format": { "type": "json_object" },
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": FALLBACK_PROMPT },
                        {
                            "type": "image_url",
                            "image_url": { "url": image_url }
                        }
                    ]
                }]
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Provider(format!("groq request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::classify_http(status, &body));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("groq response not JSON: {e}")))?;

        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::Provider("no content in groq response".to_string()))?;

        Ok(content.to_string())
    }
}
