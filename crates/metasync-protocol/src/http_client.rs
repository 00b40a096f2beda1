// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument};

use metasync_core::config::ServerConfig;
use metasync_core::error::{MetaError, Result};

use crate::transport::{HttpVerb, Response, Transport};

/// HTTPS transport with an optional bearer token.
pub struct HttpTransport {
    client: reqwest::Client,
    bearer: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MetaError::Config(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            bearer: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(verb = %verb, url = %url))]
    async fn execute(&self, verb: HttpVerb, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = match verb {
            HttpVerb::Get => self.client.get(url),
            HttpVerb::Post => self.client.post(url),
            HttpVerb::Put => self.client.put(url),
            HttpVerb::Delete => self.client.delete(url),
            HttpVerb::None => {
                return Err(MetaError::InvalidArgument(
                    "no HTTP operation selected".into(),
                ));
            }
        };
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MetaError::Transient(format!("{verb} {url}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| MetaError::Transient(format!("{verb} {url}: reading body: {e}")))?;

        debug!(status, bytes = body.len(), "response received");
        Ok(Response {
            status,
            body: body.to_vec(),
        })
    }
}
