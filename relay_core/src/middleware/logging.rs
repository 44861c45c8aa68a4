//! Request logging middleware configuration

use http::{HeaderMap, Request, Response};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnRequest, MakeSpan, OnEos, OnFailure, OnResponse, TraceLayer,
};
use tracing::{info_span, Span};

pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    DefaultOnRequest,
    StatusLogger,
    DefaultOnBodyChunk,
    StatusLogger,
    StatusLogger,
>;

pub fn logging_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(StatusLogger)
        .on_eos(StatusLogger)
        .on_failure(StatusLogger)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            version = ?request.version(),
        )
    }
}

/// Logs at a level matching the response status.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLogger;

impl<B> OnResponse<B> for StatusLogger {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis();

        if status.is_success() {
            tracing::info!(status = status.as_u16(), latency_ms = latency_ms, "request completed");
        } else if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), latency_ms = latency_ms, "client error response");
        } else {
            tracing::error!(status = status.as_u16(), latency_ms = latency_ms, "server error response");
        }
    }
}

// Downloads stream after the response head, so body completion is logged too.
impl OnEos for StatusLogger {
    fn on_eos(self, _trailers: Option<&HeaderMap>, stream_duration: Duration, _span: &Span) {
        tracing::debug!(stream_ms = stream_duration.as_millis(), "response body finished");
    }
}

impl OnFailure<ServerErrorsFailureClass> for StatusLogger {
    fn on_failure(&mut self, failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        tracing::error!(latency_ms = latency.as_millis(), error = ?failure, "request failed");
    }
}
