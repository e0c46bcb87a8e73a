//! Non-streaming Messages API client with retry on transient failures.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use wayfarer_types::ApiError;

use crate::wire::{MessagesRequest, MessagesResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// When and how long to wait before re-sending a failed request.
///
/// Rate limits, overload, 5xx responses and transport failures are retried.
/// The wait doubles from `base_delay` per attempt (with jitter) up to
/// `max_delay`; a server-supplied `retry-after` replaces the computed wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No retries: every failure is returned as is.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// The wait before retry number `attempt + 1`, or `None` when `err`
    /// should be returned to the caller.
    fn wait_after(&self, attempt: u32, err: &ApiError) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        match err {
            ApiError::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms).min(self.max_delay)),
            ApiError::RateLimited { .. }
            | ApiError::Overloaded
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout => Some(self.backoff(attempt)),
            _ => None,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let doubled = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter = rand::rng().random_range(0.75..=1.25);
        doubled.min(self.max_delay).mul_f64(jitter).min(self.max_delay)
    }
}

/// Client for `POST /v1/messages`.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Build a client. The key goes into the default headers, so a key that
    /// is not a valid header value is rejected here.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let mut key = HeaderValue::from_str(&api_key.into()).map_err(|_| ApiError::Auth {
            message: "API key is not a valid header value".into(),
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let base_url = base_url.into();
        Ok(Self {
            http,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send `request`, retrying transient failures per the client's
    /// [`RetryPolicy`]. The last error is returned once retries run out.
    pub async fn create_message(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, ApiError> {
        let mut attempt = 0;
        loop {
            let err = match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            let Some(wait) = self.retry.wait_after(attempt, &err) else {
                return Err(err);
            };
            attempt += 1;
            tracing::warn!(
                "{err}; retry {attempt}/{} in {}ms",
                self.retry.max_retries,
                wait.as_millis()
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn send_once(&self, request: &MessagesRequest) -> Result<MessagesResponse, ApiError> {
        tracing::debug!("POST {} (model {})", self.endpoint, request.model);
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let retry_after = retry_after_ms(response.headers());
        let body = response.text().await.map_err(transport_error)?;
        if status.is_success() {
            parse_response(&body)
        } else {
            Err(status_error(status, retry_after, &body))
        }
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

fn parse_response(body: &str) -> Result<MessagesResponse, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::ResponseParse(format!("{e}: {body}")))
}

/// `retry-after` is in seconds, possibly fractional.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let secs: f64 = headers.get("retry-after")?.to_str().ok()?.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0) as u64)
}

fn status_error(status: StatusCode, retry_after_ms: Option<u64>, body: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| body.to_owned());

    match status.as_u16() {
        400 => ApiError::BadRequest { message },
        401 | 403 => ApiError::Auth { message },
        429 => ApiError::RateLimited { retry_after_ms },
        529 => ApiError::Overloaded,
        code => ApiError::Server {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ContentBlock;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn retry_after_header_drives_the_wait() {
        let err = ApiError::RateLimited {
            retry_after_ms: Some(250),
        };
        assert_eq!(policy().wait_after(0, &err), Some(Duration::from_millis(250)));

        let long = ApiError::RateLimited {
            retry_after_ms: Some(60_000),
        };
        assert_eq!(policy().wait_after(0, &long), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn backoff_doubles_within_jitter_and_caps() {
        let p = policy();
        let first = p.wait_after(0, &ApiError::Overloaded).unwrap();
        assert!(first >= Duration::from_millis(74) && first <= Duration::from_millis(126));
        let third = p.wait_after(2, &ApiError::Timeout).unwrap();
        assert!(third >= Duration::from_millis(299) && third <= Duration::from_millis(501));
        assert!(p.backoff(30) <= p.max_delay);
    }

    #[test]
    fn caller_errors_and_spent_budget_stop_retrying() {
        let p = policy();
        let auth = ApiError::Auth {
            message: "bad key".into(),
        };
        assert_eq!(p.wait_after(0, &auth), None);
        assert_eq!(p.wait_after(0, &ApiError::ResponseParse("x".into())), None);
        assert_eq!(p.wait_after(3, &ApiError::Overloaded), None);
        assert_eq!(RetryPolicy::none().wait_after(0, &ApiError::Overloaded), None);
    }

    #[test]
    fn retry_after_accepts_fractional_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("0.25"));
        assert_eq!(retry_after_ms(&headers), Some(250));
        headers.insert("retry-after", HeaderValue::from_static("-1"));
        assert_eq!(retry_after_ms(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_ms(&headers), None);
    }

    #[test]
    fn status_error_uses_api_message_or_raw_body() {
        match status_error(StatusCode::BAD_GATEWAY, None, "upstream down") {
            ApiError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
        match status_error(
            StatusCode::FORBIDDEN,
            None,
            r#"{"type":"error","error":{"type":"permission_error","message":"no access"}}"#,
        ) {
            ApiError::Auth { message } => assert_eq!(message, "no access"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(10), ""),
            ApiError::RateLimited {
                retry_after_ms: Some(10)
            }
        ));
    }

    #[test]
    fn success_body_that_is_not_a_message_is_a_parse_error() {
        let err = parse_response(r#"{"content":"not a list"}"#).unwrap_err();
        match err {
            ApiError::ResponseParse(detail) => assert!(detail.contains("not a list"), "{detail}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tool_use_and_unknown_blocks_parse() {
        let resp = parse_response(
            r#"{"content":[
                {"type":"thinking","thinking":"hmm"},
                {"type":"tool_use","id":"toolu_9","name":"get_weather","input":{"location":"Paris"}}
            ],"stop_reason":"tool_use"}"#,
        )
        .unwrap();
        assert_eq!(resp.content[0], ContentBlock::Unknown);
        match &resp.content[1] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "toolu_9");
                assert_eq!(name, "get_weather");
                assert_eq!(input["location"], "Paris");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = ApiClient::new("k", "http://localhost:1/").unwrap();
        assert_eq!(client.endpoint, "http://localhost:1/v1/messages");
        assert!(ApiClient::new("bad\nkey", "http://localhost:1").is_err());
    }
}
