//! Terminal bridge for the virtual adapter.
//!
//! With `adapter = "virtual"` the daemon has no CAN interface, so stdin plays
//! the radio receiver and sensor pack and stdout plays the motor-control
//! board.  Both sides use candump notation (`1FE#0032`), so a capture can be
//! replayed with `candump -L vcan0 | cangate` or a file redirect.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use cangate_middleware::{TopicReceiver, VirtualCanAdapter};
use cangate_types::{Frame, GateError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Inject every parseable line of `reader` into `adapter`.
///
/// Blank lines are skipped and unparseable ones are logged.  Returns the
/// number of frames injected.
pub fn feed_lines(reader: impl BufRead, adapter: &VirtualCanAdapter) -> usize {
    let mut injected = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "stdin read failed; no more input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let frame = match line.parse::<Frame>() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(line = index + 1, error = %e, "input line skipped");
                continue;
            }
        };
        if let Err(e) = adapter.inject(frame) {
            warn!(error = %e, "adapter stopped accepting input");
            break;
        }
        injected += 1;
    }
    injected
}

/// Feed stdin into `adapter` from a dedicated thread and close the adapter at
/// end of input.  The thread is detached: reads block, and a pending read
/// must not hold up exit after Ctrl-C.
pub fn spawn_stdin_feeder(adapter: Arc<VirtualCanAdapter>) -> Result<(), GateError> {
    thread::Builder::new()
        .name("cangate-stdin".to_string())
        .spawn(move || {
            let injected = feed_lines(std::io::stdin().lock(), &adapter);
            info!(injected, "end of input");
            adapter.close();
        })
        .map(|_| ())
        .map_err(|e| GateError::Adapter(format!("spawn stdin thread: {e}")))
}

/// Write every frame seen on `board` to `out`, one per line, until `done`
/// fires.  Frames still buffered at that point are written before returning.
pub async fn print_frames<W>(mut board: TopicReceiver, mut out: W, mut done: oneshot::Receiver<()>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            next = board.recv() => match next {
                Ok(stamped) => {
                    if !write_frame(&mut out, &stamped.frame).await {
                        return;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "stdout fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut done => {
                while let Ok(stamped) = board.try_recv() {
                    if !write_frame(&mut out, &stamped.frame).await {
                        return;
                    }
                }
                break;
            }
        }
    }
    let _ = out.flush().await;
}

async fn write_frame<W: AsyncWrite + Unpin>(out: &mut W, frame: &Frame) -> bool {
    let line = format!("{frame}\n");
    match out.write_all(line.as_bytes()).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "stdout closed");
            false
        }
    }
}
