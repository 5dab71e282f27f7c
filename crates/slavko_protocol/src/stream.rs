//! Stream processor.
//!
//! Consumes an incremental, cancellable sequence of text fragments from
//! the model transport, reassembles complete lines, and routes each line
//! to exactly one sink: directives to [`StreamSink::directive`], everything
//! else verbatim (terminator included) to [`StreamSink::prose`]. A trailing
//! line with no terminator is handed once to [`StreamSink::flush`], but
//! only when the source ends normally; a cancelled stream discards it so a
//! truncated directive can never surface as complete.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::ProtocolResult;
use crate::message::SlavkoMessage;
use crate::parser::parse_line;

/// Sinks for one streaming session.
pub trait StreamSink: Send {
    /// A complete line of ordinary prose, terminator included.
    fn prose(&mut self, text: &str);
    /// A complete line that decoded into a protocol message.
    fn directive(&mut self, message: SlavkoMessage);
    /// The residual unterminated line at normal end of stream. The caller
    /// decides whether it parses as a directive or renders as prose.
    fn flush(&mut self, partial: &str);
}

/// How a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Source exhausted normally; any residue was flushed.
    Completed,
    /// Cancellation observed; residue discarded, no flush.
    Cancelled,
}

/// Drive one streaming session to completion or cancellation.
///
/// The cancellation token is polled before each fragment is consumed;
/// fragments already in flight may still be delivered up to that check
/// point. A transport failure from the source propagates to the caller; a
/// line that fails to parse never aborts the remaining lines.
pub async fn process<S>(
    mut source: S,
    cancel: &CancellationToken,
    sink: &mut dyn StreamSink,
) -> ProtocolResult<StreamOutcome>
where
    S: Stream<Item = ProtocolResult<String>> + Unpin,
{
    let mut pending = String::new();

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(discarded = pending.len(), "stream cancelled");
            return Ok(StreamOutcome::Cancelled);
        }

        let fragment = match source.next().await {
            Some(Ok(fragment)) => fragment,
            Some(Err(err)) => return Err(err),
            None => break,
        };

        pending.push_str(&fragment);
        while let Some(idx) = pending.find('\n') {
            let line: String = pending.drain(..=idx).collect();
            match parse_line(&line) {
                Some(message) => sink.directive(message),
                None => sink.prose(&line),
            }
        }
    }

    if !pending.is_empty() {
        sink.flush(&pending);
    }
    Ok(StreamOutcome::Completed)
}
