use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::TextBackend;
use super::decoding::DecodingParams;
use super::error::GenerationError;

/// llama.cpp `llama-server` native `/completion` endpoint.
#[derive(Clone)]
pub struct LlamaServerBackend {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: String,
}

impl LlamaServerBackend {
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

    fn body(prompt: &str, params: &DecodingParams) -> Value {
        let mut body = json!({
            "prompt": prompt,
            "n_predict": params.max_new_tokens,
            "temperature": params.effective_temperature(),
            "cache_prompt": true,
            "stream": false,
        });
        if let Some(obj) = body.as_object_mut() {
            if params.do_sample {
                if let Some(p) = params.top_p {
                    obj.insert("top_p".to_string(), json!(p));
                }
                if let Some(k) = params.top_k {
                    obj.insert("top_k".to_string(), json!(k));
                }
            } else {
                obj.insert("top_k".to_string(), json!(1));
            }
            if let Some(penalty) = params.repeat_penalty {
                obj.insert("repeat_penalty".to_string(), json!(penalty));
            }
        }
        body
    }
}

#[async_trait]
impl TextBackend for LlamaServerBackend {
    fn name(&self) -> &str {
        "llama_server"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn complete(&self, prompt: &str, params: &DecodingParams) -> Result<String, GenerationError> {
        let url = format!("{}/completion", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&Self::body(prompt, params))
            .send()
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Rejected { status, body });
        }

        let payload: CompletionResponse = res
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("invalid response: {}", e)))?;
        Ok(payload.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_native_field_names() {
        let body = LlamaServerBackend::body("hi", &DecodingParams::greedy(16));
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["n_predict"], json!(16));
        assert_eq!(body["top_k"], json!(1));
        assert_eq!(body["stream"], json!(false));
    }
}
