use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use pagediff_common::{PageDiffError, Result};
use pagediff_http::{HttpClient, HttpError};
use serde::{Deserialize, Serialize};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Client for the OpenAI Responses API (or a compatible gateway).
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
pub struct ResponsesApiRequest {
    model: String,
    input: String,
    instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesApiResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    pub model: String,
    #[serde(default)]
    pub output: Vec<ResponseMessage>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub total_tokens: u32,
}

impl OpenAiClient {
    /// Create a new client for the given API key, model, and API base
    /// (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: String, model: String, endpoint: &str) -> Result<Self> {
        let base = format!("{}/", endpoint.trim_end_matches('/'));
        let client = HttpClient::new(&base)
            .map_err(|e| PageDiffError::Config(format!("oracle endpoint: {e}")))?
            .with_timeout(std::time::Duration::from_secs(60));

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let instructions = system_prompt
            .unwrap_or("You are a precise, objective assistant.")
            .to_string();

        let req = ResponsesApiRequest {
            model: self.model.clone(),
            input: prompt.to_string(),
            instructions,
            temperature,
            max_output_tokens: max_tokens,
        };

        tracing::debug!(
            target: "oracle",
            model = %self.model,
            prompt_chars = prompt.len(),
            "openai.responses.request"
        );

        let resp: ResponsesApiResponse = self
            .client
            .post_json("responses", Some(&self.api_key), &req)
            .await
            .map_err(http_to_oracle)?;

        let text = resp
            .output
            .iter()
            .filter(|msg| msg.kind == "message")
            .flat_map(|msg| &msg.content)
            .filter(|c| c.kind == "output_text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(PageDiffError::Oracle(format!(
                "response {} ({}) carried no output text",
                resp.id, resp.status
            )));
        }

        Ok(LlmResponse {
            text,
            model: Some(resp.model),
            tokens_used: resp.usage.map(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn http_to_oracle(e: HttpError) -> PageDiffError {
    PageDiffError::Oracle(e.to_string())
}
