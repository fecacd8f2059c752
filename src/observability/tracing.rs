//! Distributed trace context propagation.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Propagate trace context to upstream requests
//! - Derive child contexts for every hop and every concurrent trial
//!
//! # Design Decisions
//! - W3C Trace Context `traceparent` header (`00-<trace>-<span>-<flags>`)
//! - Context is a plain value passed explicitly, never looked up ambiently
//! - Invalid or all-zero ids are treated as absent (new root)

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use std::convert::Infallible;

/// Header carrying the propagated trace context.
pub const TRACEPARENT: &str = "traceparent";

const VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

/// A span's position inside a distributed trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: u128,
    span_id: u64,
    parent_span_id: Option<u64>,
    sampled: bool,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: non_zero_u128(),
            span_id: non_zero_u64(),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// Create a child span in the same trace.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: non_zero_u64(),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
        }
    }

    /// Parse a `traceparent` header value.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace = parts.next()?;
        let span = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || version == "ff" || trace.len() != 32 || span.len() != 16 || flags.len() != 2 {
            return None;
        }
        // Version 00 has exactly four fields.
        if version == VERSION && parts.next().is_some() {
            return None;
        }

        let trace_id = u128::from_str_radix(trace, 16).ok()?;
        let span_id = u64::from_str_radix(span, 16).ok()?;
        let flags = u8::from_str_radix(flags, 16).ok()?;
        if trace_id == 0 || span_id == 0 {
            return None;
        }

        Some(Self {
            trace_id,
            span_id,
            parent_span_id: None,
            sampled: flags & FLAG_SAMPLED != 0,
        })
    }

    /// Render as a `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { FLAG_SAMPLED } else { 0 };
        format!("{}-{:032x}-{:016x}-{:02x}", VERSION, self.trace_id, self.span_id, flags)
    }

    /// Read the caller's context from request headers, if any.
    pub fn extract(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_traceparent)
    }

    /// Continue the caller's trace as a child span, or start a new root.
    pub fn continue_from(headers: &HeaderMap) -> Self {
        match Self::extract(headers) {
            Some(remote) => remote.child(),
            None => Self::new_root(),
        }
    }

    /// Write this context into outbound request headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.to_traceparent()) {
            headers.insert(TRACEPARENT, value);
        }
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn parent_span_id(&self) -> Option<u64> {
        self.parent_span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Trace id as 32 lowercase hex characters.
    pub fn trace_id_hex(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    /// Span id as 16 lowercase hex characters.
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// Parent span id as hex, or an empty string for a root span.
    pub fn parent_span_id_hex(&self) -> String {
        self.parent_span_id
            .map(|id| format!("{:016x}", id))
            .unwrap_or_default()
    }

    /// A local span tagged with this context's ids.
    ///
    /// `trial` is left empty for callers to record.
    pub fn span(&self, operation: &'static str) -> ::tracing::Span {
        ::tracing::info_span!(
            "span",
            operation = operation,
            trace_id = %self.trace_id_hex(),
            span_id = %self.span_id_hex(),
            parent_span_id = %self.parent_span_id_hex(),
            trial = ::tracing::field::Empty,
        )
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

fn non_zero_u128() -> u128 {
    loop {
        let id = fastrand::u128(..);
        if id != 0 {
            return id;
        }
    }
}

fn non_zero_u64() -> u64 {
    loop {
        let id = fastrand::u64(..);
        if id != 0 {
            return id;
        }
    }
}

/// Extractor yielding this hop's span: a child of the inbound `traceparent`,
/// or a fresh root when the caller sent none.
#[derive(Debug, Clone, Copy)]
pub struct InboundTrace(pub TraceContext);

impl<S> FromRequestParts<S> for InboundTrace
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(InboundTrace(TraceContext::continue_from(&parts.headers)))
    }
}
