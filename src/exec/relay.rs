// src/exec/relay.rs

//! Stream pumps: byte relays between caller buffers and the child's
//! standard streams.
//!
//! Each pump runs as its own Tokio task so a child that interleaves output
//! and input never deadlocks against the caller. Every successful transfer
//! touches the shared [`ActivityClock`].

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::ChildStdin;
use tracing::{debug, trace};

use crate::exec::clock::ActivityClock;

/// Transfer buffer size for the pump loops.
const RELAY_BUF_SIZE: usize = 8 * 1024;

/// Drain an optional caller byte source into the child's stdin, then close
/// it.
///
/// - `source` of `None` closes the child's stdin immediately; the child
///   sees end-of-input without waiting on the output relays.
/// - Write failures end the pump without failing the operation: a child is
///   free to exit without consuming its input, which surfaces here as a
///   broken pipe.
pub async fn pump_input<R>(
    source: Option<R>,
    stdin: Option<ChildStdin>,
    clock: Arc<ActivityClock>,
) where
    R: AsyncRead + Unpin,
{
    let Some(mut stdin) = stdin else {
        return;
    };
    let Some(mut source) = source else {
        // Dropping the handle closes the pipe.
        debug!("no input source; closing child stdin");
        return;
    };

    let mut buf = [0u8; RELAY_BUF_SIZE];
    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "input source read failed; closing child stdin");
                break;
            }
        };
        if let Err(e) = stdin.write_all(&buf[..n]).await {
            debug!(error = %e, "child stopped reading input");
            break;
        }
        clock.touch();
        trace!(bytes = n, "relayed input chunk");
    }

    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "error closing child stdin");
    }
}

/// Drain a child output stream into a caller-supplied sink until
/// end-of-stream, returning the sink.
///
/// Unlike the input pump, sink failures are real errors: the caller loses
/// output bytes it asked for, so the engine fails the operation.
pub async fn pump_output<S, W>(
    stream: Option<S>,
    mut sink: W,
    clock: Arc<ActivityClock>,
    label: &'static str,
) -> std::io::Result<W>
where
    S: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(sink);
    };

    let mut buf = [0u8; RELAY_BUF_SIZE];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n]).await?;
        clock.touch();
        trace!(stream = label, bytes = n, "relayed output chunk");
    }

    sink.flush().await?;
    debug!(stream = label, "relay reached end-of-stream");
    Ok(sink)
}
