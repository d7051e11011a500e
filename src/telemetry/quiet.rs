//! Quiet span release
//!
//! When a stream is dropped on a different task or thread than the one that
//! opened its span, the exporter's context bookkeeping can fail to detach
//! and logs the failure at error level. The span data is already flushed at
//! that point, so the failure is noise. [`quiet_span_exit`] silences the
//! exporter's log target for the duration of the release and swallows that
//! one failure; anything else still propagates.

use super::levels::LevelRegistry;
use super::span::{SpanFailure, SpanHandle};
use crate::error::TracingError;
use std::sync::Arc;

/// Message fragment of the cross-context detach failure
pub const CROSS_CONTEXT_DETACH: &str = "was created in a different Context";

/// Log target silenced while a span is released
pub const DEFAULT_NOISY_TARGET: &str = "opentelemetry";

/// True only for the cross-context detach failure raised while releasing a span
pub fn is_spurious(err: &TracingError) -> bool {
    match err {
        TracingError::SpanExit(message) => message.contains(CROSS_CONTEXT_DETACH),
        _ => false,
    }
}

/// Release `span` with `noisy_target` silenced, swallowing the spurious
/// detach failure
pub fn quiet_span_exit(
    span: Box<dyn SpanHandle>,
    failure: Option<&SpanFailure>,
    levels: &Arc<LevelRegistry>,
    noisy_target: &str,
) -> Result<(), TracingError> {
    let quiet = levels.suppress(noisy_target);

    match span.exit(failure) {
        Ok(()) => Ok(()),
        Err(err) if is_spurious(&err) => {
            tracing::debug!(
                error = %err,
                silenced = quiet.target(),
                "Context detach suppressed during span exit"
            );
            Ok(())
        }
        Err(err) => Err(err),
    }
}
