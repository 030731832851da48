//! Span and attribute names shared by instrumented code.
//!
//! Probe spans follow the OTel GenAI naming `"{operation} {model}"`, e.g.
//! `"probe gemini-2.5-flash"`.

pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

/// The model ID requested (e.g. "gemini-2.5-flash").
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

pub const HTTP_RESPONSE_STATUS_CODE: &str = "http.response.status_code";

/// Operation name for a key validity probe.
pub const OP_PROBE: &str = "probe";

pub const PROVIDER_GEMINI: &str = "gemini";

/// Span name for a probe against `model`.
pub fn probe_span_name(model: &str) -> String {
    format!("{OP_PROBE} {model}")
}

/// Filter directive for a verbosity level: `-q` gives errors only, no flag
/// gives warnings, `-v` adds chanops debug output and `-vv` traces everything.
pub fn verbosity_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,chanops=debug",
        _ => "trace",
    }
}
