use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::AiError;

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Base URL; `/v1/chat/completions` is appended unless the URL already
    /// ends in `/v1`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Blocking client for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct ChatClient {
    url: Url,
    model: String,
    http: reqwest::blocking::Client,
}

impl ChatClient {
    pub fn new(config: &ChatClientConfig) -> Result<Self, AiError> {
        if config.model.trim().is_empty() {
            return Err(AiError::InvalidConfig("model must not be empty".into()));
        }
        let url = completions_endpoint(&Url::parse(&config.endpoint)?)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| AiError::InvalidConfig("api key is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(concat!("annotator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url,
            model: config.model.clone(),
            http,
        })
    }

    /// Sends `prompt` as a single user message and returns the first
    /// choice's content.
    pub fn complete(&self, prompt: &str) -> Result<String, AiError> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self.http.post(self.url.clone()).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AiError::UnexpectedResponse(format!("status {status}")));
        }
        let bytes = response.bytes()?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::UnexpectedResponse("response has no choices".into()))
    }
}

fn completions_endpoint(base: &Url) -> Result<Url, AiError> {
    let base_str = base.as_str().trim_end_matches('/').to_string();
    let base = Url::parse(&format!("{base_str}/"))?;
    if base.path().trim_end_matches('/').ends_with("/v1") {
        Ok(base.join("chat/completions")?)
    } else {
        Ok(base.join("v1/chat/completions")?)
    }
}
