//! Google Gemini text generation over the public REST API.

use super::{QueryError, TextGenerator};
use crate::config::FinderConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use tracing::{debug, error, instrument};

/// Default model to use
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Base URL for the Gemini API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Text generator backed by a Gemini model.
pub struct GeminiGenerator {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl GeminiGenerator {
    /// Creates a generator with the default model and HTTP settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiGenerator {
            api_key: api_key.into(),
            client: Client::new(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: API_BASE_URL.to_owned(),
            temperature: None,
        }
    }

    /// Creates a generator from the crate configuration, applying its model,
    /// temperature and request timeout.
    pub fn from_config(config: &FinderConfig) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let generator = GeminiGenerator {
            client,
            ..Self::new(config.api_key.clone()).with_model(config.model.clone())
        };
        Ok(match config.temperature {
            Some(temperature) => generator.with_temperature(temperature),
            None => generator,
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Points the generator at another API root, e.g. a proxy.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: self.temperature.map(|temperature| GenerationConfig {
                temperature: Some(temperature),
                candidate_count: 1,
            }),
        }
    }

    /// Joins the text parts of the first candidate.
    fn extract_text(response: GenerateResponse) -> Option<String> {
        let parts = response
            .candidates?
            .into_iter()
            .next()?
            .content?
            .parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }

    fn map_api_error(status: u16, body: &str) -> QueryError {
        let message = serde_json::from_str::<GenerateResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.to_owned(), |e| e.message);

        match status {
            429 => QueryError::RateLimited(message),
            _ => QueryError::Api { status, message },
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<Option<String>, QueryError> {
        debug!("sending request to Gemini");

        let response = self
            .client
            .post(self.build_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| QueryError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::Http(e.without_url()))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "failed to decode Gemini response");
            QueryError::Decode(e)
        })?;

        if let Some(api_error) = parsed.error {
            return Err(QueryError::Api {
                status: status.as_u16(),
                message: api_error.message,
            });
        }

        let text = Self::extract_text(parsed);
        debug!(chars = text.as_ref().map_or(0, String::len), "received Gemini response");
        Ok(text)
    }
}

impl Debug for GeminiGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiGenerator")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use mockito::Matcher;

    #[test]
    fn test_request_shape() {
        let generator = GeminiGenerator::new("key").with_temperature(0.2);
        let value = serde_json::to_value(generator.build_request("hello")).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["candidateCount"], 1);

        let plain = serde_json::to_value(GeminiGenerator::new("key").build_request("hi")).unwrap();
        assert!(plain.get("generationConfig").is_none());
    }

    #[test]
    fn test_from_config() {
        let config = FinderConfig::new("key", "favorites.json")
            .with_model("gemini-1.5-pro")
            .with_temperature(0.5);
        let generator = GeminiGenerator::from_config(&config).unwrap();
        assert_eq!(generator.model(), "gemini-1.5-pro");

        let value = serde_json::to_value(generator.build_request("hello")).unwrap();
        assert_eq!(value["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_url_and_redacted_debug() {
        let generator = GeminiGenerator::new("secret")
            .with_model("gemini-1.5-flash")
            .with_base_url("http://localhost:1234/");
        assert_eq!(
            generator.build_url(),
            "http://localhost:1234/models/gemini-1.5-flash:generateContent"
        );
        assert!(!format!("{generator:?}").contains("secret"));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(indoc! {r#"
            {"candidates":[{"content":{"parts":[{"text":"[{\"id\":"},{"text":"\"1\"}]"}]}}]}"#})
        .unwrap();
        assert_eq!(
            GeminiGenerator::extract_text(response).as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(GeminiGenerator::extract_text(empty).is_none());
    }

    #[test]
    fn test_map_api_error() {
        let body = r#"{"error":{"message":"Please retry in 6s."}}"#;
        assert!(matches!(
            GeminiGenerator::map_api_error(429, body),
            QueryError::RateLimited(m) if m == "Please retry in 6s."
        ));
        assert!(matches!(
            GeminiGenerator::map_api_error(500, "boom"),
            QueryError::Api { status: 500, message } if message == "boom"
        ));
    }

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                Matcher::Regex(r"^/models/gemini-2\.5-flash:generateContent".into()),
            )
            .match_header("x-goog-api-key", "k")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Sure! []"}]}}]}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new("k").with_base_url(server.url());
        let text = generator.generate("prompt").await.unwrap();
        assert_eq!(text.as_deref(), Some("Sure! []"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(503)
            .with_body(r#"{"error":{"message":"overloaded"}}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new("k").with_base_url(server.url());
        let err = generator.generate("prompt").await.unwrap_err();
        assert!(matches!(err, QueryError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        let generator = GeminiGenerator::new("SUPERSECRETKEY").with_base_url("http://127.0.0.1:1");
        let err = generator.generate("prompt").await.unwrap_err();
        assert!(matches!(err, QueryError::Http(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
        assert!(!format!("{err:?}").contains("SUPERSECRETKEY"));
    }
}
