//! Default diagnostic sink.

use super::traits::DiagnosticSink;

/// Re-emits encoder diagnostics as tracing warnings.
///
/// The encoder runs at `-loglevel warning` by default, so anything it prints
/// on stderr is worth surfacing at that level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn line(&self, line: &str) {
        tracing::warn!(target: "hlsvod::encoder", "{}", line);
    }
}
