// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Oracle job resolver: HTTP fetch plus optional JSON-path extraction.
//!
//! The resolver runs inside the executor and performs the fetch the
//! requesting contract described: method, URL, and headers come straight
//! from the request event. When a `json_path` is present the response body
//! is parsed as JSON and the dotted path (object keys and array indices)
//! is extracted, so contracts receive just the value they asked for.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Response body cap; bodies beyond this are treated as errors.
const BODY_LIMIT: usize = 1 << 20; // 1 MiB

/// Per-fetch timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An oracle fetch job, as described by the request event.
#[derive(Debug, Clone)]
pub struct OracleJob {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub json_path: Option<String>,
}

/// Error type for resolver failures.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("build request: {0}")]
    BadRequest(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("response body exceeds {BODY_LIMIT} bytes")]
    BodyTooLarge,

    #[error("json path {path:?} not found in response")]
    PathNotFound { path: String },

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Boxed future returned by resolver implementations.
pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, ResolverError>> + Send + 'a>>;

/// Resolves oracle jobs to result bytes.
pub trait OracleResolver: Send + Sync {
    fn resolve<'a>(&'a self, job: &'a OracleJob) -> ResolveFuture<'a>;
}

/// HTTP-backed resolver.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch(&self, job: &OracleJob) -> Result<Vec<u8>, ResolverError> {
        let method: reqwest::Method = job
            .method
            .parse()
            .map_err(|_| ResolverError::BadRequest(format!("invalid method {}", job.method)))?;

        let mut request = self.client.request(method, &job.url);
        for (name, value) in &job.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolverError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::UpstreamStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ResolverError::Fetch(e.to_string()))?;
        if body.len() > BODY_LIMIT {
            return Err(ResolverError::BodyTooLarge);
        }

        match &job.json_path {
            None => Ok(body.to_vec()),
            Some(path) => extract_json_path(&body, path),
        }
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleResolver for HttpResolver {
    fn resolve<'a>(&'a self, job: &'a OracleJob) -> ResolveFuture<'a> {
        Box::pin(self.fetch(job))
    }
}

/// Walk a dotted path (`data.quotes.0.price`) through a JSON body and
/// return the addressed value. Strings are returned raw (no quotes); other
/// values are re-serialized as compact JSON.
pub fn extract_json_path(body: &[u8], path: &str) -> Result<Vec<u8>, ResolverError> {
    let root: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ResolverError::InvalidJson(e.to_string()))?;

    let mut current = &root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment),
            serde_json::Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx)),
            _ => None,
        }
        .ok_or_else(|| ResolverError::PathNotFound {
            path: path.to_string(),
        })?;
    }

    Ok(match current {
        serde_json::Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_object_values() {
        let body = br#"{"data":{"price":"105000.25","source":"agg"}}"#;
        let value = extract_json_path(body, "data.price").unwrap();
        assert_eq!(value, b"105000.25");
    }

    #[test]
    fn extracts_array_indices() {
        let body = br#"{"quotes":[{"px":1.08},{"px":1.09}]}"#;
        let value = extract_json_path(body, "quotes.1.px").unwrap();
        assert_eq!(value, b"1.09");
    }

    #[test]
    fn missing_path_and_invalid_json_error() {
        assert!(matches!(
            extract_json_path(br#"{"a":1}"#, "b.c"),
            Err(ResolverError::PathNotFound { .. })
        ));
        assert!(matches!(
            extract_json_path(b"not json", "a"),
            Err(ResolverError::InvalidJson(_))
        ));
    }

    #[test]
    fn non_string_leaves_serialize_compactly() {
        let body = br#"{"value":{"bid":1,"ask":2}}"#;
        let value = extract_json_path(body, "value").unwrap();
        assert_eq!(value, br#"{"ask":2,"bid":1}"#.to_vec());
    }
}
