//! HTTP requests.

use super::CapabilityError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Authentication applied to outgoing requests.
#[derive(Debug, Clone)]
pub enum HttpAuth {
    Bearer(String),
    /// `user:password` pair.
    Basic(String),
    /// Raw `Authorization` header value.
    Token(String),
}

/// One HTTP request as the engine assembles it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    /// `Name: value` header lines.
    pub headers: Vec<String>,
    pub auth: Option<HttpAuth>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// HTTP capability consumed by the engine. Non-2xx responses are
/// returned, not raised; the engine decides whether they fail the
/// statement.
#[async_trait]
pub trait HttpCapability: Send + Sync {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, CapabilityError>;
}

/// reqwest-backed client.
pub struct HttpClient {
    client: reqwest::Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpCapability for HttpClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, CapabilityError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| CapabilityError::Http(format!("invalid method `{}`", request.method)))?;
        let url = url::Url::parse(&request.url)
            .map_err(|e| CapabilityError::Http(format!("invalid url `{}`: {e}", request.url)))?;

        let mut builder = self.client.request(method, url);
        for header in &request.headers {
            if let Some((name, value)) = header.split_once(':') {
                builder = builder.header(name.trim(), value.trim());
            }
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }
        match &request.auth {
            Some(HttpAuth::Bearer(token)) => builder = builder.bearer_auth(token),
            Some(HttpAuth::Basic(credentials)) => {
                let (user, password) = credentials
                    .split_once(':')
                    .map(|(u, p)| (u.to_string(), Some(p.to_string())))
                    .unwrap_or((credentials.clone(), None));
                builder = builder.basic_auth(user, password);
            }
            Some(HttpAuth::Token(value)) => {
                builder = builder.header(reqwest::header::AUTHORIZATION, value);
            }
            None => {}
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::Timeout {
                    seconds: request.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                }
            } else {
                CapabilityError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::Http(format!("reading body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_http_error() {
        let client = HttpClient::new();
        let err = client
            .request(HttpRequest {
                method: "get".into(),
                url: "not a url".into(),
                headers: vec![],
                auth: None,
                body: None,
                timeout: None,
                content_type: None,
                accept: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "http");
    }
}
