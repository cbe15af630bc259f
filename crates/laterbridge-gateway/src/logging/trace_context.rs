//! Trace Context - request correlation and structured logging

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, info_span, Span};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Short id for one request, 6 hex characters (e.g. "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    let mixed = counter.wrapping_mul(0x9E37_79B9).wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    /// JSON-RPC method for `/mcp` requests (e.g. `tools/call`)
    pub mcp_method: Option<String>,
    /// Fingerprint of the access token, never the token itself
    pub principal: Option<String>,
    pub started_at: Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            mcp_method: None,
            principal: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_mcp_method(mut self, method: Option<String>) -> Self {
        self.mcp_method = method;
        self
    }

    pub fn with_principal(mut self, fingerprint: String) -> Self {
        self.principal = Some(fingerprint);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn principal_or_anon(&self) -> &str {
        self.principal.as_deref().unwrap_or("anon")
    }
}

/// Span and access-line helpers
pub struct RequestSpan;

impl RequestSpan {
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "request",
            trace_id = %ctx.trace_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    pub fn log_entry(ctx: &TraceContext) {
        match &ctx.mcp_method {
            Some(mcp_method) => info!(
                trace_id = %ctx.trace_id,
                "→ {} {} {} token={}",
                ctx.method,
                ctx.path,
                mcp_method,
                ctx.principal_or_anon()
            ),
            None => info!(trace_id = %ctx.trace_id, "→ {} {}", ctx.method, ctx.path),
        }
    }

    pub fn log_exit(ctx: &TraceContext, status: u16) {
        let elapsed = ctx.elapsed_ms();
        match &ctx.mcp_method {
            Some(mcp_method) => info!(
                trace_id = %ctx.trace_id,
                "← {} {} ({}ms)",
                status,
                mcp_method,
                elapsed
            ),
            None => info!(trace_id = %ctx.trace_id, "← {} ({}ms)", status, elapsed),
        }
    }
}
