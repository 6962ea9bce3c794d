// File: src/client/lookup.rs
//! Status lookup provider.
//!
//! `StatusLookup` takes the tracked names and returns free-form text plus
//! citations. `GenerativeLookupClient` asks a Gemini-style
//! `generateContent` endpoint with search grounding to answer in the
//! header/marker layout the parser understands.
use crate::error::LookupError;
use crate::model::{StatusClassification, StatusSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResponse {
    pub text: String,
    pub sources: Vec<StatusSource>,
}

#[async_trait]
pub trait StatusLookup: Send + Sync {
    /// `names` must not be empty.
    async fn check_statuses(&self, names: &[String]) -> Result<LookupResponse, LookupError>;
}

/// Builds the instruction sent to the provider for `names`.
pub fn build_prompt(names: &[String]) -> String {
    let mut prompt = String::from(
        "For each TV series below, search for its latest news and report whether new \
         episodes are out, a new season is confirmed, it is in production, it is awaiting \
         renewal, or it has ended.\n\nSeries:\n",
    );
    for name in names {
        prompt.push_str(&format!("- {}\n", name));
    }
    prompt.push_str(
        "\nAnswer with one block per series, in the same order, using exactly this layout:\n\n\
         **Series Name**\nStatus: <marker> <label>\nLatest Info: <one or two sentences>\n\n\
         Use exactly one of these status values:\n",
    );
    for class in StatusClassification::iter() {
        if let Some(marker) = class.marker() {
            prompt.push_str(&format!("- {} {}\n", marker, class.label()));
        }
    }
    prompt.push_str("\nDo not add any other bold text.");
    prompt
}

// --- Wire types ---

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Default)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Deserialize, Default)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl GenerateResponse {
    fn into_lookup(self) -> LookupResponse {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return LookupResponse {
                text: String::new(),
                sources: Vec::new(),
            };
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let sources = candidate
            .grounding_metadata
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .filter_map(|web| {
                let uri = web.uri?;
                if !seen.insert(uri.clone()) {
                    return None;
                }
                Some(StatusSource {
                    title: web.title.unwrap_or_default(),
                    uri,
                })
            })
            .collect();

        LookupResponse { text, sources }
    }
}

#[derive(Clone, Debug)]
pub struct GenerativeLookupClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GenerativeLookupClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            http,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl StatusLookup for GenerativeLookupClient {
    async fn check_statuses(&self, names: &[String]) -> Result<LookupResponse, LookupError> {
        if names.is_empty() {
            return Err(LookupError::NoSeries);
        }
        if self.api_key.is_empty() {
            return Err(LookupError::Misconfigured("lookup_api_key is empty".to_string()));
        }
        if self.endpoint.is_empty() || self.model.is_empty() {
            return Err(LookupError::Misconfigured(
                "lookup_endpoint and lookup_model must be set".to_string(),
            ));
        }

        let prompt = build_prompt(names);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            tools: vec![Tool {
                google_search: serde_json::json!({}),
            }],
        };

        log::debug!("Requesting status for {} series", names.len());
        let resp = self
            .http
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LookupError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let raw = resp
            .text()
            .await
            .map_err(|e| LookupError::Unreachable(e.to_string()))?;
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&raw).map_err(|e| LookupError::Decode(e.to_string()))?;
        let lookup = parsed.into_lookup();
        if lookup.text.trim().is_empty() {
            return Err(LookupError::EmptyResponse);
        }
        Ok(lookup)
    }
}
