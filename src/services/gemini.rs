// src/services/gemini.rs
use crate::errors::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const GENERATE_CONTENT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// "Raw extraction" strategy: ask for the printed text as-is and the final
/// per-item price, and do the cleaning ourselves afterwards.
const EXTRACTION_PROMPT: &str = r#"Analiza este ticket de compra de una tienda de celulares. Extrae los DATOS CRUDOS tal como aparecen impresos en el papel.

1. invoiceNumber: el texto que sigue a "Factura No.", "Folio" o "Ticket". (Ej: "1053 753779" o "1053-753779").
2. rawDate: busca la palabra "Fecha:" y extrae todo el texto que esté a su lado. (Ej: "01-Jun-25").
3. rawCustomerName: busca la línea que contiene "Nombre:" y devuelve LA LÍNEA COMPLETA. (Ej: "Nombre: ALEJANDRA DE LA CRUZ FAJARDO").
4. items: lista de celulares detectados.
   - brand: MARCA (SAMSUNG, APPLE, MOTOROLA, XIAOMI, OPPO, ZTE, HONOR, HUAWEI, REALME, VIVO, SENWA, NUBIA, OTRO).
   - price: PRECIO FINAL (precio base menos los descuentos que aparezcan justo debajo).
   - Ignora accesorios (chips, fundas) y cualquier item o descuento de valor <= 1.00.

Devuelve únicamente el objeto JSON."#;

/// One structured-output completion against the primary vision provider.
///
/// Implementations classify their own failures into [`ProviderError`]; the
/// analyzer only decides what each classification means for the walk.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        image_b64: &str,
    ) -> Result<String, ProviderError>;
}

pub struct GeminiClient {
    client: Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        image_b64: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{GENERATE_CONTENT_BASE}/{model}:generateContent?key={api_key}");

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": EXTRACTION_PROMPT },
                        {
                            "inlineData": {
                                "mimeType": "image/jpeg",
                                "data": image_b64
                            }
                        }
                    ]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {
                        "type": "OBJECT",
                        "properties": {
                            "invoiceNumber": { "type": "STRING" },
                            "rawDate": { "type": "STRING" },
                            "rawCustomerName": { "type": "STRING" },
                            "items": {
                                "type": "ARRAY",
                                "items": {
                                    "type": "OBJECT",
                                    "properties": {
                                        "brand": { "type": "STRING" },
                                        "price": { "type": "NUMBER" }
                                    }
                                }
                            }
                        }
                    }
                }
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Provider(format!("gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::classify_http(status, &body));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("gemini response not JSON: {e}")))?;

        let text = result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                ProviderError::Provider("no text candidate in gemini response".to_string())
            })?;

        Ok(text.to_string())
    }
}
