// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server client: transport + envelope + retry.
//
// All reconciliation traffic goes through `ServerClient`, which
//   - retries transient failures with backoff,
//   - maps non-success statuses onto `MetaError`,
//   - strips the versioned envelope off every answer,
//   - wraps every submitted payload in the client's envelope.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use metasync_core::error::{MetaError, Result};

use crate::endpoint::Endpoints;
use crate::envelope;
use crate::retry::{RetryConfig, RetryDecision, should_retry, status_error};
use crate::transport::{HttpVerb, Response, ResponseLog, Transport};

#[derive(Clone)]
pub struct ServerClient {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    retry: RetryConfig,
    log: Option<Arc<dyn ResponseLog>>,
}

impl ServerClient {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints, retry: RetryConfig) -> Self {
        Self {
            transport,
            endpoints,
            retry,
            log: None,
        }
    }

    /// Record every exchange in `log`.
    pub fn with_log(mut self, log: Arc<dyn ResponseLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// One exchange, retried while the failure is transient.
    async fn exchange(&self, verb: HttpVerb, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let err = match self.transport.execute(verb, url, body).await {
                Ok(response) => {
                    if let Some(log) = &self.log {
                        if let Err(e) = log.record(verb, url, &response) {
                            warn!(error = %e, "could not journal server response");
                        }
                    }
                    if response.is_success() {
                        return Ok(response);
                    }
                    status_error(response.status, response.body_text())
                }
                Err(e) => e,
            };

            match should_retry(&err, attempt, &self.retry) {
                RetryDecision::RetryAfter(delay) => {
                    debug!(%verb, url, attempt, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            }
        }
    }

    /// Fetch one document and return its data object.
    #[instrument(skip(self))]
    pub async fn get_data(&self, url: &str) -> Result<Value> {
        let response = self.exchange(HttpVerb::Get, url, None).await?;
        let (_, data) = envelope::strip_version(&response.body)?;
        Ok(data)
    }

    /// Fetch the record at `url`. A 404 means the server no longer has it
    /// and reads as `NotFound`; anywhere else a 404 is a plain HTTP error.
    #[instrument(skip(self))]
    pub async fn get_record(&self, url: &str) -> Result<Value> {
        match self.get_data(url).await {
            Err(MetaError::Http { status: 404, detail }) => Err(MetaError::NotFound(detail)),
            other => other,
        }
    }

    /// Submit a mutation. POST and PUT carry `payload` in an envelope;
    /// DELETE sends no body. Returns the data object of the answer, or
    /// `Null` when the server answered with an empty body.
    #[instrument(skip(self, payload), fields(verb = %verb))]
    pub async fn submit(&self, verb: HttpVerb, url: &str, payload: Option<Value>) -> Result<Value> {
        let body = match verb {
            HttpVerb::Post | HttpVerb::Put => {
                let payload = payload.ok_or_else(|| {
                    MetaError::InvalidArgument(format!("{verb} requires a payload"))
                })?;
                Some(envelope::wrap(payload))
            }
            HttpVerb::Delete => None,
            HttpVerb::Get | HttpVerb::None => {
                return Err(MetaError::InvalidArgument(format!(
                    "{verb} is not a submission"
                )));
            }
        };

        info!(%verb, url, "submitting to server");
        let response = self.exchange(verb, url, body.as_ref()).await?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        let (_, data) = envelope::strip_version(&response.body)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Answers from a fixed script, recording every call.
    struct Scripted {
        answers: Mutex<Vec<Result<Response>>>,
        calls: Mutex<Vec<(HttpVerb, String, Option<Value>)>>,
    }

    impl Scripted {
        fn new(mut answers: Vec<Result<Response>>) -> Arc<Self> {
            answers.reverse();
            Arc::new(Self {
                answers: Mutex::new(answers),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, verb: HttpVerb, url: &str, body: Option<&Value>) -> Result<Response> {
            self.calls
                .lock()
                .expect("calls")
                .push((verb, url.to_string(), body.cloned()));
            self.answers
                .lock()
                .expect("answers")
                .pop()
                .expect("script exhausted")
        }
    }

    fn ok(body: Value) -> Result<Response> {
        Ok(Response {
            status: 200,
            body: serde_json::to_vec(&body).expect("encode"),
        })
    }

    fn client(transport: Arc<Scripted>, retries: u32) -> ServerClient {
        let retry = RetryConfig {
            max_retries: retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        ServerClient::new(
            transport,
            Endpoints::new("https://acvp.example/acvp/v1").expect("base"),
            retry,
        )
    }

    #[tokio::test]
    async fn get_strips_envelope() {
        let t = Scripted::new(vec![ok(json!([{"acvVersion": "1.0"}, {"name": "x"}]))]);
        let data = client(t, 0).get_data("https://acvp.example/acvp/v1/oes/1").await.expect("get");
        assert_eq!(data, json!({"name": "x"}));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let t = Scripted::new(vec![
            Err(MetaError::Transient("reset".into())),
            Ok(Response {
                status: 503,
                body: Vec::new(),
            }),
            ok(json!({"ok": true})),
        ]);
        let data = client(Arc::clone(&t), 3).get_data("https://h/x").await.expect("third try");
        assert_eq!(data["ok"], true);
        assert_eq!(t.calls.lock().expect("calls").len(), 3);
    }

    fn gone() -> Result<Response> {
        Ok(Response {
            status: 404,
            body: b"gone".to_vec(),
        })
    }

    #[tokio::test]
    async fn missing_record_reads_as_not_found() {
        let t = Scripted::new(vec![gone()]);
        let err = client(Arc::clone(&t), 3).get_record("https://h/oes/7").await.unwrap_err();
        assert!(matches!(err, MetaError::NotFound(_)));
        assert_eq!(t.calls.lock().expect("calls").len(), 1);
    }

    #[tokio::test]
    async fn other_404s_stay_http_errors() {
        let t = Scripted::new(vec![gone(), gone()]);
        let c = client(Arc::clone(&t), 3);

        let err = c.get_data("https://h/oes?offset=0").await.unwrap_err();
        assert!(matches!(err, MetaError::Http { status: 404, .. }));
        assert!(!err.is_soft());

        let err = c
            .submit(HttpVerb::Put, "https://h/oes/7", Some(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::Http { status: 404, .. }));
        assert_eq!(t.calls.lock().expect("calls").len(), 2);
    }

    #[tokio::test]
    async fn submit_wraps_payload_and_delete_has_no_body() {
        let t = Scripted::new(vec![
            ok(json!([{"acvVersion": "1.0"}, {"url": "/acvp/v1/requests/5", "status": "initial"}])),
            Ok(Response {
                status: 204,
                body: Vec::new(),
            }),
        ]);
        let c = client(Arc::clone(&t), 0);
        let answer = c
            .submit(HttpVerb::Post, "https://h/dependencies", Some(json!({"type": "processor"})))
            .await
            .expect("post");
        assert_eq!(answer["status"], "initial");
        let answer = c
            .submit(HttpVerb::Delete, "https://h/dependencies/3", None)
            .await
            .expect("delete");
        assert_eq!(answer, Value::Null);

        let calls = t.calls.lock().expect("calls");
        assert_eq!(
            calls[0].2,
            Some(json!([{"acvVersion": "1.0"}, {"type": "processor"}]))
        );
        assert_eq!(calls[1].2, None);
    }
}
