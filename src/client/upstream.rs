//! [`R2rClient`]: thin JSON-over-HTTP adapter for the R2R v3 API.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::{R2rError, Result};

/// HTTP methods accepted by the upstream adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = R2rError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(R2rError::InvalidArgument(format!(
                "Unsupported HTTP method: {other}"
            ))),
        }
    }
}

/// Client for the R2R REST API.
///
/// Stateless per call: cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct R2rClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl R2rClient {
    /// Build a client from upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Self::with_base_url(
            config.base_url.clone(),
            config.api_key.clone(),
            config.timeout(),
        )
    }

    /// Create a client with an explicit base URL (for testing with wiremock).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| R2rError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Issue a request with a method given by name.
    ///
    /// Unsupported methods fail with [`R2rError::InvalidArgument`] before
    /// any network I/O.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
        params: Option<&Value>,
    ) -> Result<Value> {
        let method: Method = method.parse()?;
        self.send(method, path, body, params).await
    }

    pub async fn get(&self, path: &str, params: Option<&Value>) -> Result<Value> {
        self.send(Method::Get, path, None, params).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::Post, path, Some(body), None).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::Put, path, Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::Delete, path, None, None).await
    }

    /// Issue one request and decode the JSON response.
    ///
    /// `body` is sent for POST/PUT (an empty object when absent); `params`
    /// becomes the query string for GET. Status >= 400 fails with
    /// [`R2rError::UpstreamHttp`].
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        params: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(path);
        let empty = Value::Object(Default::default());

        let mut builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        }
        .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        builder = match method {
            Method::Get => builder.query(&query_pairs(params)),
            Method::Post | Method::Put => builder.json(body.unwrap_or(&empty)),
            Method::Delete => builder,
        };

        debug!(%method, %url, "upstream request");
        let response = builder.send().await?;
        let status = response.status();

        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(R2rError::UpstreamHttp {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Flatten a JSON object into query pairs. Nulls are dropped; strings are
/// sent verbatim, everything else in its JSON form.
fn query_pairs(params: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = params else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
    }

    #[test]
    fn unsupported_method_is_invalid_argument() {
        let err = "PATCH".parse::<Method>().unwrap_err();
        assert!(matches!(err, R2rError::InvalidArgument(_)));
    }

    #[test]
    fn query_pairs_stringify_scalars_and_drop_nulls() {
        let params = json!({"limit": 10, "entity_names": "a,b", "offset": null});
        let mut pairs = query_pairs(Some(&params));
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("entity_names".to_string(), "a,b".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn url_joins_with_single_slash() {
        let client =
            R2rClient::with_base_url("http://r2r:7272/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/v3/health"), "http://r2r:7272/v3/health");
        assert_eq!(client.url("v3/health"), "http://r2r:7272/v3/health");
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let client =
            R2rClient::with_base_url("http://r2r", Some(String::new()), Duration::from_secs(1))
                .unwrap();
        assert!(!client.has_api_key());
    }
}
