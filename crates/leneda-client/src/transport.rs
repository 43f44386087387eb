// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use crate::errors::{LenedaError, LenedaResult};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use std::fmt;
use tracing::{debug, error, trace};

pub const DEFAULT_BASE_URL: &str = "https://api.leneda.lu/api";

/// `X-API-KEY`
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
/// `X-ENERGY-ID`
pub const ENERGY_ID_HEADER: HeaderName = HeaderName::from_static("x-energy-id");

/// Signed HTTP access to the Leneda REST API
///
/// Holds the credentials and base URL, nothing else. Every call is a single
/// attempt: failures go straight back to the caller.
#[derive(Clone)]
pub struct Transport {
    base_url: String,
    api_key: String,
    energy_id: String,
    client: Client,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("energy_id", &self.energy_id)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        energy_id: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            energy_id: energy_id.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn energy_id(&self) -> &str {
        &self.energy_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> LenedaResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| LenedaError::Config("API key contains invalid characters".into()))?,
        );
        headers.insert(
            ENERGY_ID_HEADER,
            HeaderValue::from_str(&self.energy_id)
                .map_err(|_| LenedaError::Config("energy id contains invalid characters".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Issue one request and return the parsed JSON body of a 2xx response
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> LenedaResult<Value> {
        let url = self.url(path);
        debug!("🔍 [LENEDA] {} {}", method, url);
        if let Some(query) = query {
            trace!("   Query: {:?}", query);
        }

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.headers()?);
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            trace!("   Body: {}", body);
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("❌ [LENEDA] {} {} failed: {}", method, url, e);
            LenedaError::Network(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("❌ [LENEDA] {} {} -> status {}", method, url, status);
            debug!("   Body: {}", text);
            return Err(LenedaError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("✅ [LENEDA] {} {} -> {}", method, url, status);

        if text.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|e| LenedaError::parse("<body>", format!("response is not valid JSON: {e}")))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> LenedaResult<Value> {
        self.request(Method::GET, path, Some(query), None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> LenedaResult<Value> {
        self.request(Method::POST, path, None, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn transport(base_url: String) -> Transport {
        Transport::new(base_url, "test_api_key", "test_energy_id", Client::new())
    }

    #[tokio::test]
    async fn test_get_sends_headers_and_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/ping")
            .match_header("x-api-key", "test_api_key")
            .match_header("x-energy-id", "test_energy_id")
            .match_header("content-type", "application/json")
            .match_query(Matcher::UrlEncoded("a".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"ok": true}).to_string())
            .create_async()
            .await;

        let transport = transport(format!("{}/api/", server.url()));
        let body = transport
            .get("ping", &[("a", "1".to_string())])
            .await
            .unwrap();

        assert_eq!(body, json!({"ok": true}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_keeps_status_and_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/missing")
            .with_status(404)
            .with_body("no such metering point")
            .expect(1)
            .create_async()
            .await;

        let transport = transport(format!("{}/api", server.url()));
        let err = transport.get("missing", &[]).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some("no such metering point"));
        // a single attempt, no retry
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_success_body_is_empty_object() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/submit")
            .with_status(204)
            .create_async()
            .await;

        let transport = transport(format!("{}/api", server.url()));
        let body = transport.post("submit", &json!({})).await.unwrap();

        assert_eq!(body, json!({}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/garbage")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let transport = transport(format!("{}/api", server.url()));
        let err = transport.get("garbage", &[]).await.unwrap_err();

        assert_eq!(err.field(), Some("<body>"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) is closed on any sane test host
        let transport = transport("http://127.0.0.1:9/api".to_string());
        let err = transport.get("anything", &[]).await.unwrap_err();

        assert!(matches!(err, LenedaError::Network(_)));
        assert!(err.is_transport());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let transport = transport("http://localhost/api".to_string());
        let debug = format!("{transport:?}");
        assert!(!debug.contains("test_api_key"));
        assert!(debug.contains("<redacted>"));
    }
}
