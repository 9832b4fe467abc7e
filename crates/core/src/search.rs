//! Vector Search Client
//!
//! Queries the hosted vector store that indexes the book and reshapes its
//! response into a stable [`SearchResponse`]. The store answers in more than one
//! shape, so normalization walks a fixed field-priority chain and never fails:
//! a payload it cannot make sense of becomes an empty response with `error` set.

use reqwest::header::ACCEPT;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Logical document collection every query is scoped to.
pub const NAMESPACE: &str = "ClientFinance";

const SEARCH_PATH: &str = "/openai/assistant/clientfinance";
const DEFAULT_SCORE: f64 = 1.0;
const FORMAT_ERROR: &str = "Failed to process search response";

/// Failures of the search request itself. Normalization never produces one.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Search failed: {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("Invalid search response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where a passage was found in the book.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Number(Number),
    Label(String),
    Unspecified,
}

impl Page {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self::Number(number.clone())),
            Value::String(label) if !label.is_empty() => Some(Self::Label(label.clone())),
            _ => None,
        }
    }
}

impl Serialize for Page {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Page::Number(number) => number.serialize(serializer),
            Page::Label(label) => serializer.serialize_str(label),
            Page::Unspecified => serializer.serialize_str("unspecified"),
        }
    }
}

/// A single normalized passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub page: Page,
    pub score: f64,
}

/// The normalized outcome of one search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    /// The payload exactly as the store returned it.
    pub raw_response: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-call knobs for [`SearchClient::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Overrides the client-wide request timeout for this call.
    pub timeout: Option<Duration>,
}

/// Client for the hosted vector-search endpoint.
///
/// The endpoint is public: no credential is attached to the request.
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearchClient {
    /// Hosted store used when `SEARCH_URL` is not configured.
    pub const DEFAULT_BASE_URL: &'static str = "https://app-vectordb-ia.azurewebsites.net";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), SEARCH_PATH)
    }

    /// Runs `query` against the book's namespace and normalizes the answer.
    #[instrument(name = "vector_search", skip(self, options), fields(namespace = NAMESPACE))]
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse, SearchError> {
        self.send_query(query, options)
            .await
            .inspect_err(|e| error!(error = %e, "Vector search failed"))
    }

    async fn send_query(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse, SearchError> {
        let mut request = self
            .http
            .post(self.endpoint())
            .query(&[("question", query), ("namespace", NAMESPACE)])
            .header(ACCEPT, "application/json")
            .body(Vec::new());
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.bytes().await?;
        let payload: Value = serde_json::from_slice(&body)?;
        let formatted = format_search_results(payload);
        debug!(total_results = formatted.total_results, "Vector search completed");
        Ok(formatted)
    }
}

/// Normalizes a raw store payload into a [`SearchResponse`].
///
/// Accepted shapes, in order:
/// 1. `{results: [...]}`: one result per element.
/// 2. `{content, ...}`: a single result built from the top level.
/// 3. anything else that is an object: no results.
///
/// Text comes from `content` then `text`; page from `metadata.page` then `page`,
/// else `unspecified`; score from `score` then `relevance`, else `1.0`.
pub fn format_search_results(raw: Value) -> SearchResponse {
    match collect_results(&raw) {
        Ok(results) => SearchResponse {
            total_results: results.len(),
            results,
            raw_response: raw,
            error: None,
        },
        Err(reason) => {
            error!(%reason, "Failed to format search results");
            SearchResponse {
                results: Vec::new(),
                total_results: 0,
                raw_response: raw,
                error: Some(FORMAT_ERROR.to_string()),
            }
        }
    }
}

fn collect_results(raw: &Value) -> Result<Vec<SearchResult>, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| "payload is not a JSON object".to_string())?;

    match object.get("results") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_object()
                    .map(to_search_result)
                    .ok_or_else(|| format!("results[{index}] is not an object"))
            })
            .collect(),
        None | Some(Value::Null) => {
            if object.get("content").and_then(non_empty_text).is_some() {
                Ok(vec![to_search_result(object)])
            } else {
                Ok(Vec::new())
            }
        }
        Some(_) => Err("`results` is not an array".to_string()),
    }
}

fn to_search_result(item: &Map<String, Value>) -> SearchResult {
    let text = ["content", "text"]
        .iter()
        .find_map(|key| item.get(*key).and_then(non_empty_text))
        .unwrap_or_default();

    let page = item
        .get("metadata")
        .and_then(|metadata| metadata.get("page"))
        .and_then(Page::from_value)
        .or_else(|| item.get("page").and_then(Page::from_value))
        .unwrap_or(Page::Unspecified);

    let score = ["score", "relevance"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_f64))
        .unwrap_or(DEFAULT_SCORE);

    SearchResult { text, page, score }
}

fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string, header, method, path, query_param},
    };

    #[test]
    fn test_results_array_follows_field_priority() {
        let response = format_search_results(json!({
            "results": [
                { "content": "primary", "text": "ignored", "metadata": { "page": 12 }, "page": 99, "score": 0.9, "relevance": 0.1 },
                { "text": "fallback text", "page": "iv", "relevance": 0.4 },
                { "content": "bare" }
            ]
        }));

        assert_eq!(response.total_results, 3);
        assert_eq!(response.results.len(), 3);
        assert!(response.error.is_none());

        assert_eq!(
            response.results[0],
            SearchResult {
                text: "primary".to_string(),
                page: Page::Number(12.into()),
                score: 0.9,
            }
        );
        assert_eq!(
            response.results[1],
            SearchResult {
                text: "fallback text".to_string(),
                page: Page::Label("iv".to_string()),
                score: 0.4,
            }
        );
        assert_eq!(
            response.results[2],
            SearchResult {
                text: "bare".to_string(),
                page: Page::Unspecified,
                score: 1.0,
            }
        );
    }

    #[test]
    fn test_content_only_payload_is_a_single_result() {
        let response = format_search_results(json!({ "content": "Le RRE est un régime." }));

        assert_eq!(response.total_results, 1);
        assert_eq!(response.results[0].text, "Le RRE est un régime.");
        assert_eq!(response.results[0].page, Page::Unspecified);
        assert_eq!(response.results[0].score, 1.0);
    }

    #[test]
    fn test_content_payload_reads_top_level_page_and_score() {
        let response = format_search_results(json!({
            "content": "texte",
            "metadata": { "page": 7 },
            "score": 0.55
        }));

        assert_eq!(response.results[0].page, Page::Number(7.into()));
        assert_eq!(response.results[0].score, 0.55);
    }

    #[test]
    fn test_false_text_fields_count_as_absent() {
        let response = format_search_results(json!({ "content": false }));
        assert_eq!(response.total_results, 0);
        assert!(response.error.is_none());

        let response = format_search_results(json!({
            "results": [{ "content": false, "text": "Le budget" }]
        }));
        assert_eq!(response.results[0].text, "Le budget");
    }

    #[test]
    fn test_payload_without_results_or_content_is_empty() {
        let response = format_search_results(json!({ "answer": "nothing here" }));

        assert!(response.results.is_empty());
        assert_eq!(response.total_results, 0);
        assert!(response.error.is_none());
        assert_eq!(response.raw_response, json!({ "answer": "nothing here" }));
    }

    #[test]
    fn test_malformed_results_are_downgraded_to_an_error_field() {
        let raw = json!({ "results": "not-an-array" });
        let response = format_search_results(raw.clone());

        assert!(response.results.is_empty());
        assert_eq!(response.total_results, 0);
        assert!(response.error.is_some());
        assert_eq!(response.raw_response, raw);
    }

    #[test]
    fn test_non_object_payloads_are_downgraded() {
        assert!(format_search_results(json!(null)).error.is_some());
        assert!(format_search_results(json!({ "results": [42] })).error.is_some());
    }

    #[test]
    fn test_response_serializes_in_camel_case() {
        let response = format_search_results(json!({ "results": [] }));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["totalResults"], 0);
        assert_eq!(value["rawResponse"], json!({ "results": [] }));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_unspecified_page_serializes_as_label() {
        let result = SearchResult {
            text: "x".to_string(),
            page: Page::Unspecified,
            score: 1.0,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "text": "x", "page": "unspecified", "score": 1.0 })
        );
    }

    #[tokio::test]
    async fn test_search_posts_scoped_query_with_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/assistant/clientfinance"))
            .and(query_param("question", "qu'est-ce que le RRE?"))
            .and(query_param("namespace", "ClientFinance"))
            .and(header("accept", "application/json"))
            .and(body_string(""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "content": "Le RRE est...", "metadata": { "page": 12 }, "score": 0.9 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let response = client
            .search("qu'est-ce que le RRE?", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.total_results, 1);
        assert_eq!(response.results[0].text, "Le RRE est...");
    }

    #[tokio::test]
    async fn test_search_fails_on_unsuccessful_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = SearchClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = client
            .search("RRE", &SearchOptions::default())
            .await
            .unwrap_err();

        match err {
            SearchError::Status {
                status,
                status_text,
            } => {
                assert_eq!(status, 503);
                assert_eq!(status_text, "Service Unavailable");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_honours_per_call_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = SearchClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let options = SearchOptions {
            timeout: Some(Duration::from_millis(50)),
        };
        let err = client.search("RRE", &options).await.unwrap_err();
        assert!(matches!(err, SearchError::Http(e) if e.is_timeout()));
    }
}
