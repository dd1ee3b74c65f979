//! Embedder for OpenAI-compatible `/v1/embeddings` APIs.
//!
//! Works with OpenAI, Azure OpenAI and local servers that speak the same
//! protocol (vLLM, LM Studio, text-embeddings-inference, Ollama).

use ragrank_core::embedding::{Embedder, EmbeddingError};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for [`HttpEmbedder`].
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// API endpoint (e.g., "https://api.openai.com/v1/embeddings")
    pub endpoint: String,
    /// Bearer token. Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
    pub model: String,
    /// Expected embedding dimension; responses of another length are rejected.
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_batch_size: usize,
    /// Scale returned vectors to unit length.
    pub normalize: bool,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
            max_batch_size: 100,
            normalize: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Blocking HTTP client for an embeddings endpoint.
#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        if config.dimensions == 0 {
            return Err(EmbeddingError::Config("dimensions must be > 0".into()));
        }
        if config.max_batch_size == 0 {
            return Err(EmbeddingError::Config("max_batch_size must be > 0".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        match &api_key {
            Some(key) => {
                let value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| EmbeddingError::Config(format!("invalid API key: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
            None if config.endpoint.contains("openai.com") => {
                warn!(endpoint = %config.endpoint, "No API key configured");
            }
            None => {}
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            dimensions = config.dimensions,
            "HTTP embedder initialized"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpEmbedderConfig {
        &self.config
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            // Only text-embedding-3 models accept a requested dimension.
            dimensions: self
                .config
                .model
                .contains("text-embedding-3")
                .then_some(self.config.dimensions),
            encoding_format: "float",
        };
        debug!(endpoint = %self.config.endpoint, texts = texts.len(), "Sending embedding request");

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(EmbeddingError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::Request(api_error_message(status, &body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;
        if let Some(usage) = &parsed.usage {
            debug!(total_tokens = usage.total_tokens, "Embedding request usage");
        }
        self.collect(parsed, texts.len())
    }

    fn collect(
        &self,
        response: EmbeddingResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if response.data.len() != expected {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            )));
        }
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        data.into_iter()
            .map(|d| {
                if d.embedding.len() != self.config.dimensions {
                    return Err(EmbeddingError::Dimension {
                        expected: self.config.dimensions,
                        actual: d.embedding.len(),
                    });
                }
                Ok(if self.config.normalize {
                    normalize(d.embedding)
                } else {
                    d.embedding
                })
            })
            .collect()
    }
}

/// Retry-After in delta-seconds, as milliseconds. HTTP dates are not supported.
fn parse_retry_after(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => format!("API error ({status}): {}", parsed.error.message),
        Err(_) => format!("HTTP error ({status}): {body}"),
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.request(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding returned".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.max_batch_size) {
            out.extend(self.request(chunk)?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(dimensions: usize) -> HttpEmbedder {
        HttpEmbedder::new(HttpEmbedderConfig {
            endpoint: "http://127.0.0.1:9/v1/embeddings".into(),
            api_key: Some("test".into()),
            dimensions,
            ..HttpEmbedderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = HttpEmbedderConfig::default();
        assert_eq!(config.endpoint, "https://api.openai.com/v1/embeddings");
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.max_batch_size, 100);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let err = HttpEmbedder::new(HttpEmbedderConfig {
            dimensions: 0,
            ..HttpEmbedderConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, EmbeddingError::Config(_)));
    }

    #[test]
    fn test_collect_sorts_by_index_and_normalizes() {
        let e = embedder(2);
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[0.0,2.0],"index":1},{"embedding":[3.0,4.0],"index":0}]}"#,
        )
        .unwrap();
        let out = e.collect(response, 2).unwrap();
        assert!((out[0][0] - 0.6).abs() < 1e-6);
        assert!((out[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(out[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_collect_rejects_wrong_dimension() {
        let e = embedder(3);
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[1.0,0.0],"index":0}]}"#).unwrap();
        assert!(matches!(
            e.collect(response, 1),
            Err(EmbeddingError::Dimension {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_collect_rejects_missing_items() {
        let e = embedder(2);
        let response: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(
            e.collect(response, 1),
            Err(EmbeddingError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_api_error_message() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        let msg = api_error_message(status, r#"{"error":{"message":"bad input"}}"#);
        assert!(msg.contains("bad input"));
        let msg = api_error_message(status, "plain text");
        assert!(msg.contains("plain text"));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(2000));
        assert_eq!(parse_retry_after(" 0 "), Some(0));
        assert_eq!(parse_retry_after("18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    #[test]
    fn test_unreachable_endpoint_is_request_error() {
        let e = embedder(2);
        assert!(matches!(e.embed("hello"), Err(EmbeddingError::Request(_))));
    }
}
