use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::backend::TextBackend;
use super::decoding::DecodingParams;
use super::error::GenerationError;

/// Ollama `/api/generate` in raw mode, so the prompt reaches the model
/// exactly as assembled.
#[derive(Clone)]
pub struct OllamaBackend {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Deserialize)]
struct TagInfo {
    name: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn options(params: &DecodingParams) -> Value {
        let mut options = Map::new();
        options.insert("num_predict".to_string(), json!(params.max_new_tokens));
        options.insert("temperature".to_string(), json!(params.effective_temperature()));
        if params.do_sample {
            if let Some(p) = params.top_p {
                options.insert("top_p".to_string(), json!(p));
            }
            if let Some(k) = params.top_k {
                options.insert("top_k".to_string(), json!(k));
            }
        } else {
            options.insert("top_k".to_string(), json!(1));
        }
        if let Some(penalty) = params.repeat_penalty {
            options.insert("repeat_penalty".to_string(), json!(penalty));
        }
        Value::Object(options)
    }
}

#[async_trait]
impl TextBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = match self.client.get(&url).send().await {
            Ok(res) if res.status().is_success() => res,
            _ => return Ok(false),
        };
        let tags: TagsResponse = match res.json().await {
            Ok(tags) => tags,
            Err(_) => return Ok(false),
        };
        let wanted = self.model.as_str();
        Ok(tags
            .models
            .iter()
            .any(|m| m.name == wanted || m.name.strip_suffix(":latest") == Some(wanted)))
    }

    async fn complete(&self, prompt: &str, params: &DecodingParams) -> Result<String, GenerationError> {
        if params.num_beams > 1 {
            tracing::debug!("Ollama has no beam search; decoding greedily instead");
        }

        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "raw": true,
            "stream": false,
            "options": Self::options(params),
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Rejected { status, body });
        }

        let payload: GenerateResponse = res
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("invalid response: {}", e)))?;
        Ok(payload.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_options_pin_temperature_and_top_k() {
        let options = OllamaBackend::options(&DecodingParams::greedy(32));
        assert_eq!(options["temperature"], json!(0.0));
        assert_eq!(options["top_k"], json!(1));
        assert_eq!(options["num_predict"], json!(32));
        assert!(options.get("top_p").is_none());
    }

    #[test]
    fn sampling_options_carry_configured_values() {
        let params = DecodingParams {
            do_sample: true,
            temperature: Some(0.5),
            top_p: Some(0.9),
            top_k: Some(40),
            repeat_penalty: Some(1.1),
            num_beams: 1,
            max_new_tokens: 128,
        };
        let options = OllamaBackend::options(&params);
        assert_eq!(options["temperature"], json!(0.5f32));
        assert_eq!(options["top_k"], json!(40));
        assert_eq!(options["repeat_penalty"], json!(1.1f32));
    }
}
