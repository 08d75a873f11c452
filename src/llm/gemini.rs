use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use super::provider::LlmProvider;
use super::types::ChatRequest;

/// Provider for the Google Generative Language API (Gemini models for
/// generation, text-embedding models for embeddings).
#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn model_url(&self, model_id: &str, verb: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}?key={}",
            self.base_url, model_id, verb, self.api_key
        )
    }
}

/// Gemini's wire roles are "user" and "model"; everything that is not an
/// assistant turn is sent as "user".
fn wire_role(role: &str) -> &'static str {
    match role {
        "assistant" | "model" => "model",
        _ => "user",
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1beta/models?key={}", self.base_url, self.api_key);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = self.model_url(model_id, "generateContent");

        let mut system_parts: Vec<Value> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        for message in &request.messages {
            if message.role == "system" {
                system_parts.push(json!({ "text": message.content }));
            } else {
                contents.push(json!({
                    "role": wire_role(&message.role),
                    "parts": [{ "text": message.content }],
                }));
            }
        }

        let mut body = json!({ "contents": contents });
        if let Some(obj) = body.as_object_mut() {
            if !system_parts.is_empty() {
                obj.insert(
                    "systemInstruction".to_string(),
                    json!({ "parts": system_parts }),
                );
            }
            let mut generation_config = serde_json::Map::new();
            if let Some(t) = request.temperature {
                generation_config.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                generation_config.insert("maxOutputTokens".to_string(), json!(t));
            }
            if !generation_config.is_empty() {
                obj.insert("generationConfig".to_string(), Value::Object(generation_config));
            }
        }

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Gemini generateContent failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let answer = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(ApiError::Upstream(
                "Gemini returned no candidate text".to_string(),
            ));
        }

        Ok(answer)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.model_url(model_id, "batchEmbedContents");

        let requests: Vec<Value> = inputs
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{model_id}"),
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let res = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Gemini batchEmbedContents failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let mut embeddings = Vec::with_capacity(inputs.len());
        if let Some(entries) = payload["embeddings"].as_array() {
            for entry in entries {
                let vector: Vec<f32> = entry["values"]
                    .as_array()
                    .map(|vals| {
                        vals.iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect()
                    })
                    .unwrap_or_default();
                embeddings.push(vector);
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "Gemini returned {} embeddings for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}
