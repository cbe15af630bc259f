//! Request correlation for the HTTP gateway
//!
//! Every request gets a short trace id that is attached to its span and
//! carried in request extensions, so the MCP handler and the OAuth routes
//! log under the same id as the access line.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
