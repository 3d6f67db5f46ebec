//! One-shot HTTP exchanges over an HTTP channel.
//!
//! Every `send` opens the channel, waits for the response, copies it out and
//! closes the channel again, whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use hyper::http::{Request, Response};

use crate::channel::{ChannelIo, ChannelSpec};
use crate::config::ChannelsConfig;
use crate::lifecycle::{LifecycleError, ResourceLifecycle, ShutdownSignal};
use crate::provider::{HttpRequest, ProviderError, Provider};
use crate::resilience::retries::RetryPolicy;
use crate::services::ServiceError;

/// Initial size of the `Name: value` header line buffer.
const HEADER_BUF_LEN: usize = 512;

/// Header lines that still fill a buffer this large are rejected.
const MAX_HEADER_LEN: usize = 8192;

/// Body bytes copied per provider call.
const BODY_CHUNK_LEN: usize = 1024;

pub struct HttpClient<P: Provider + ?Sized> {
    lifecycle: ResourceLifecycle<P>,
    response_timeout: Option<Duration>,
}

impl<P: Provider + ?Sized> HttpClient<P> {
    pub fn new(provider: Arc<P>, config: &ChannelsConfig, shutdown: ShutdownSignal) -> Self {
        let lifecycle = ResourceLifecycle::new(
            provider,
            ChannelSpec::http(&config.http),
            config.lifecycle.clone(),
            RetryPolicy::from(&config.retries),
            shutdown,
        );
        Self {
            lifecycle,
            response_timeout: config.lifecycle.response_timeout(),
        }
    }

    pub fn lifecycle(&self) -> &ResourceLifecycle<P> {
        &self.lifecycle
    }

    /// Perform one request/response exchange.
    pub async fn send(&mut self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ServiceError> {
        let result = self.exchange(&request).await;
        let closed = self.lifecycle.close();

        let service = self.lifecycle.spec().service.as_str();
        let response = result.map_err(|e| ServiceError::unavailable(service, e))?;
        closed.map_err(|e| ServiceError::unavailable(service, e))?;

        tracing::info!(
            service = %service,
            status = response.status().as_u16(),
            body_len = response.body().len(),
            "HTTP response received"
        );
        Ok(response)
    }

    async fn exchange(&mut self, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, LifecycleError> {
        self.lifecycle.poll_status()?;
        self.lifecycle.ensure_open().await?;

        let wire = to_wire(request, self.response_timeout);
        let mut io = self.lifecycle.io()?;
        io.send_http_request(&wire)?;
        io.wait_readable(self.response_timeout).await?;

        let response = read_response(&mut io)?;
        io.consume_readable();
        Ok(response)
    }
}

impl<P: Provider + ?Sized> std::fmt::Debug for HttpClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("lifecycle", &self.lifecycle)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

fn to_wire(request: &Request<Vec<u8>>, timeout: Option<Duration>) -> HttpRequest {
    HttpRequest {
        method: request.method().as_str().to_string(),
        url: request.uri().to_string(),
        headers: request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: request.body().clone(),
        timeout_ms: timeout
            .map(|t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX))
            .unwrap_or(0),
    }
}

fn read_response<P: Provider + ?Sized>(io: &mut ChannelIo<'_, P>) -> Result<Response<Vec<u8>>, LifecycleError> {
    let data = io.http_response_data()?;
    if data.result.is_error() {
        return Err(LifecycleError::Io {
            op: "read response data",
            source: ProviderError::Status(data.result),
        });
    }

    let mut builder = Response::builder().status(data.status_code);
    let mut line = vec![0u8; HEADER_BUF_LEN];
    for index in 0..data.num_headers {
        let n = read_header_line(io, index, &mut line)?;
        let (name, value) = parse_header(&line[..n])?;
        builder = builder.header(name, value);
    }

    let body_len = data.body_length as usize;
    let mut body = Vec::with_capacity(body_len);
    let mut chunk = [0u8; BODY_CHUNK_LEN];
    while body.len() < body_len {
        let n = io.read_body(body.len(), &mut chunk)?;
        if n == 0 {
            break;
        }
        let take = n.min(body_len - body.len());
        body.extend_from_slice(&chunk[..take]);
    }
    if body.len() < body_len {
        return Err(LifecycleError::MalformedResponse(format!(
            "body truncated at {} of {} bytes",
            body.len(),
            body_len
        )));
    }

    builder
        .body(body)
        .map_err(|e| LifecycleError::MalformedResponse(e.to_string()))
}

/// Copy header `index` into `line`, growing it until the copy no longer
/// fills the buffer. The provider does not report the full length.
fn read_header_line<P: Provider + ?Sized>(
    io: &mut ChannelIo<'_, P>,
    index: u32,
    line: &mut Vec<u8>,
) -> Result<usize, LifecycleError> {
    loop {
        let n = io.read_header(index, line)?;
        if n < line.len() {
            return Ok(n);
        }
        if line.len() >= MAX_HEADER_LEN {
            return Err(LifecycleError::MalformedResponse(format!(
                "header {index} longer than {MAX_HEADER_LEN} bytes"
            )));
        }
        let grown = (line.len() * 2).min(MAX_HEADER_LEN);
        line.resize(grown, 0);
    }
}

fn parse_header(raw: &[u8]) -> Result<(&str, &str), LifecycleError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| LifecycleError::MalformedResponse("header is not UTF-8".to_string()))?;
    let (name, value) = text
        .split_once(':')
        .ok_or_else(|| LifecycleError::MalformedResponse(format!("header without ':': {text}")))?;
    Ok((name.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::provider::{SimProvider, SimResponse};

    fn client(sim: &Arc<SimProvider>) -> HttpClient<SimProvider> {
        let mut config = ChannelsConfig::default();
        config.lifecycle.poll_interval_ms = 1;
        HttpClient::new(Arc::clone(sim), &config, ShutdownSignal::never())
    }

    #[test]
    fn test_parse_header_trims() {
        assert_eq!(parse_header(b"Content-Type:  text/plain ").unwrap(), ("Content-Type", "text/plain"));
        assert!(matches!(
            parse_header(b"no separator"),
            Err(LifecycleError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_to_wire_copies_request() {
        let request = Request::builder()
            .method("POST")
            .uri("http://example.com/api")
            .header("X-Device", "mv1")
            .body(b"payload".to_vec())
            .unwrap();
        let wire = to_wire(&request, Some(Duration::from_secs(2)));
        assert_eq!(wire.method, "POST");
        assert_eq!(wire.url, "http://example.com/api");
        assert_eq!(wire.headers, vec![("x-device".to_string(), "mv1".to_string())]);
        assert_eq!(wire.body, b"payload");
        assert_eq!(wire.timeout_ms, 2000);
    }

    #[tokio::test]
    async fn test_send_returns_response_and_closes() {
        let sim = Arc::new(SimProvider::new().with_http_responder(|req| SimResponse {
            status: 201,
            headers: vec![("Location".to_string(), req.url.clone())],
            body: vec![b'x'; 3000],
        }));
        let mut http = client(&sim);

        let request = Request::get("http://example.com/items").body(Vec::new()).unwrap();
        let response = http.send(request).await.unwrap();

        assert_eq!(response.status().as_u16(), 201);
        assert_eq!(response.headers()["location"], "http://example.com/items");
        assert_eq!(response.body().len(), 3000);
        assert_eq!(http.lifecycle().state(), LifecycleState::Idle);
        assert_eq!(sim.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_long_header_is_read_whole() {
        let token = "t".repeat(1500);
        let expected = token.clone();
        let sim = Arc::new(SimProvider::new().with_http_responder(move |_| SimResponse {
            status: 200,
            headers: vec![("X-Token".to_string(), token.clone())],
            body: Vec::new(),
        }));
        let mut http = client(&sim);

        let request = Request::get("http://example.com/").body(Vec::new()).unwrap();
        let response = http.send(request).await.unwrap();
        assert_eq!(response.headers()["x-token"], expected.as_str());
    }

    #[tokio::test]
    async fn test_oversized_header_is_malformed() {
        let sim = Arc::new(SimProvider::new().with_http_responder(|_| SimResponse {
            status: 200,
            headers: vec![("X-Huge".to_string(), "h".repeat(MAX_HEADER_LEN))],
            body: Vec::new(),
        }));
        let mut http = client(&sim);

        let request = Request::get("http://example.com/").body(Vec::new()).unwrap();
        let err = http.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unavailable {
                source: LifecycleError::MalformedResponse(_),
                ..
            }
        ));
        assert_eq!(http.lifecycle().state(), LifecycleState::Idle);
        assert_eq!(sim.live_handles(), 0);
    }
}
