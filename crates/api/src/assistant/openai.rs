//! OpenAI-compatible chat completions, including local LM Studio servers.

use super::{Completions, Deltas, Error, Result, Turn};
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;

const OPENAI_URL: &str = "https://api.openai.com/v1";

pub struct OpenAi {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAi {
    /// Targets `base_url` when given, the public OpenAI API otherwise. Local servers expect model names
    /// without the `openai/` vendor prefix.
    pub fn new(api_key: Option<String>, model: &str, base_url: Option<&str>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(std::time::Duration::from_secs(120)).build()?;
        let model = match base_url {
            Some(_) => model.strip_prefix("openai/").unwrap_or(model),
            None => model,
        };
        let base = base_url.unwrap_or(OPENAI_URL).trim_end_matches('/');
        Ok(Self { client, endpoint: format!("{base}/chat/completions"), api_key, model: model.into() })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, body: &serde_json::Value) -> Result<Response> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| {
            log::warn!("cannot reach {}: {err}", self.endpoint);
            Error::Request
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::warn!("completion request failed with {status}: {text}");
            return Err(Error::Status(status.as_u16()));
        }
        Ok(response)
    }
}

impl Completions for OpenAi {
    async fn stream(&self, turns: &[Turn]) -> Result<Deltas> {
        let body = json!({ "model": self.model, "messages": turns, "stream": true });
        let response = self.post(&body).await?;

        let mut decoder = Decoder::default();
        let deltas = response
            .bytes_stream()
            .map_err(|err| {
                log::warn!("completion stream broke off: {err}");
                Error::Stream
            })
            .map_ok(move |chunk| stream::iter(decoder.feed(&chunk).into_iter().map(Ok::<_, Error>)))
            .try_flatten();
        Ok(deltas.boxed())
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        let body = json!({ "model": self.model, "messages": turns, "temperature": 0.2, "max_tokens": 300 });
        let response: Completion = self.post(&body).await?.json().await.map_err(|err| {
            log::warn!("cannot decode completion: {err}");
            Error::Response
        })?;
        response.choices.into_iter().next().and_then(|choice| choice.message.content).ok_or(Error::Response)
    }
}

#[derive(Deserialize)]
struct Completion {
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

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Splits a server-sent event stream into content deltas. Lines may straddle chunk boundaries.
#[derive(Default)]
struct Decoder {
    pending: Vec<u8>,
}

impl Decoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut deltas = Vec::new();
        while let Some(end) = self.pending.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let Ok(line) = core::str::from_utf8(&line) else {
                continue;
            };
            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() || data == "[DONE]" {
                continue;
            }

            match serde_json::from_str::<Chunk>(data) {
                Ok(chunk) => deltas.extend(
                    chunk.choices.into_iter().filter_map(|choice| choice.delta.content).filter(|text| !text.is_empty()),
                ),
                Err(err) => log::debug!("skipping undecodable stream event: {err}"),
            }
        }
        deltas
    }
}
