use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use bytes::{Buf, Bytes};
use futures_util::{Stream, StreamExt};
use relay_core::config::StreamConfig;
use relay_protocol::{UiEvent, UpstreamEvent};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::FrameDecoder;
use crate::error::SessionError;
use crate::session::StreamSession;
use crate::writer::SseWriter;

/// Limits for one streaming session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Instant after which the upstream read is abandoned.
    pub upstream_deadline: Instant,
    /// Time allowed for writing the terminal sequence once upstream is done.
    pub flush_timeout: Duration,
    pub max_frame_bytes: usize,
    pub channel_capacity: usize,
}

impl SessionOptions {
    /// Derive limits from config, counting from `started` (normally when the
    /// request arrived, so connect time is charged against the budget).
    pub fn from_config(config: &StreamConfig, started: Instant) -> Self {
        let budget = config.upstream_budget();
        Self {
            upstream_deadline: started + budget,
            flush_timeout: config.response_deadline().saturating_sub(budget),
            max_frame_bytes: config.max_frame_bytes,
            channel_capacity: config.channel_capacity(),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Upstream reached end of stream.
    Completed,
    /// Upstream read failed mid-stream; an `error` event was sent.
    Failed(String),
    /// Stopped through the cancellation token.
    Cancelled,
    /// Upstream budget ran out.
    TimedOut,
    /// The client went away; nothing more could be written.
    ClientGone,
}

/// Summary of one finished session, for logging and tests.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub frames: usize,
    pub skipped: usize,
    pub events: usize,
    /// Whether the terminal sentinel reached the sink.
    pub done_sent: bool,
}

/// Result of [`translate`]: the SSE body and the task producing it.
pub struct Translation {
    pub body: ReceiverStream<Bytes>,
    pub task: JoinHandle<SessionReport>,
}

/// Translate an upstream byte stream into an SSE byte stream.
///
/// Spawns the producer task and hands back the receiving end of a bounded
/// channel. Dropping the body tears down the upstream connection.
pub fn translate<S, B, E>(
    upstream: S,
    session: StreamSession,
    options: SessionOptions,
    cancel: CancellationToken,
) -> Translation
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: Into<io::Error> + Send + 'static,
{
    let (writer, rx) = SseWriter::channel(options.channel_capacity);
    let task =
        tokio::spawn(async move { drive_session(upstream, session, writer, &options, &cancel).await });
    Translation {
        body: ReceiverStream::new(rx),
        task,
    }
}

/// Run one session to completion.
///
/// Guarantees, on every path where the sink is still open: `start` is the
/// first event, `finish` goes out exactly once, and `[DONE]` is the last
/// frame. The upstream stream is dropped (closing its connection) before
/// finalization starts.
pub async fn drive_session<S, B, E>(
    upstream: S,
    mut session: StreamSession,
    mut writer: SseWriter,
    options: &SessionOptions,
    cancel: &CancellationToken,
) -> SessionReport
where
    S: Stream<Item = Result<B, E>> + Send,
    B: Buf + Send,
    E: Into<io::Error>,
{
    let mut stats = PumpStats::default();

    if writer.send(&UiEvent::Start).await.is_err() {
        debug!("client gone before stream start");
        return report(SessionOutcome::ClientGone, &stats, &writer, false);
    }

    let reader = StreamReader::new(Box::pin(upstream));
    let mut frames = FramedRead::new(reader, FrameDecoder::new(options.max_frame_bytes));
    let watcher = writer.close_watcher();
    // Events derived from upstream but not yet accepted by the sink. An
    // interrupted send leaves its event at the front, so cancellation never
    // loses half of a frame's output.
    let mut pending = VecDeque::new();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => SessionOutcome::Cancelled,
        _ = watcher.closed() => SessionOutcome::ClientGone,
        _ = tokio::time::sleep_until(options.upstream_deadline) => SessionOutcome::TimedOut,
        outcome = pump(&mut frames, &mut session, &mut writer, &mut pending, &mut stats) => outcome,
    };
    drop(frames);
    drop(watcher);

    match &outcome {
        SessionOutcome::ClientGone => {
            info!(frames = stats.frames, "client disconnected, upstream aborted");
            return report(outcome, &stats, &writer, false);
        }
        SessionOutcome::Failed(message) => {
            warn!(error = %message, "upstream stream failed");
        }
        SessionOutcome::TimedOut => warn!("upstream budget exhausted, finalizing stream"),
        SessionOutcome::Cancelled => info!("stream cancelled, finalizing"),
        SessionOutcome::Completed => {}
    }

    let failure = match &outcome {
        SessionOutcome::Failed(message) => Some(message.clone()),
        _ => None,
    };
    let events_before = writer.events_written();
    let flushed = tokio::time::timeout(
        options.flush_timeout,
        finalize(&mut session, writer, failure, &mut pending),
    )
    .await;

    let (done_sent, events) = match flushed {
        Ok(Ok(events)) => (true, events),
        Ok(Err(_)) => {
            debug!("sink closed during finalization");
            (false, events_before)
        }
        Err(_) => {
            warn!("terminal sequence not flushed in time");
            (false, events_before)
        }
    };

    info!(
        outcome = ?outcome,
        frames = stats.frames,
        skipped = stats.skipped,
        events,
        "stream session finished"
    );
    SessionReport {
        outcome,
        frames: stats.frames,
        skipped: stats.skipped,
        events,
        done_sent,
    }
}

#[derive(Debug, Default)]
struct PumpStats {
    frames: usize,
    skipped: usize,
}

fn report(
    outcome: SessionOutcome,
    stats: &PumpStats,
    writer: &SseWriter,
    done_sent: bool,
) -> SessionReport {
    SessionReport {
        outcome,
        frames: stats.frames,
        skipped: stats.skipped,
        events: writer.events_written(),
        done_sent,
    }
}

/// Frame reader → parser → state machine → writer, one frame at a time.
async fn pump<R>(
    frames: &mut FramedRead<R, FrameDecoder>,
    session: &mut StreamSession,
    writer: &mut SseWriter,
    pending: &mut VecDeque<UiEvent>,
    stats: &mut PumpStats,
) -> SessionOutcome
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut out = Vec::new();
    while let Some(line) = frames.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => return SessionOutcome::Failed(e.to_string()),
        };
        stats.frames += 1;

        let event = match UpstreamEvent::parse_line(&line) {
            Ok(event) => event,
            Err(e) => {
                stats.skipped += 1;
                if e.is_unknown_tag() {
                    debug!(error = %e, "ignoring frame");
                } else {
                    debug!(error = %e, "skipping malformed frame");
                }
                continue;
            }
        };

        session.apply(event, &mut out);
        pending.extend(out.drain(..));
        match flush(writer, pending).await {
            Ok(()) => {}
            Err(SessionError::SinkClosed) => return SessionOutcome::ClientGone,
            Err(e @ SessionError::Encode(_)) => return SessionOutcome::Failed(e.to_string()),
        }
    }
    SessionOutcome::Completed
}

/// Write queued events in order, removing each only once the sink took it.
/// Safe to drop mid-way; whatever was not written stays queued.
async fn flush(writer: &mut SseWriter, pending: &mut VecDeque<UiEvent>) -> Result<(), SessionError> {
    while let Some(event) = pending.front() {
        let sent = writer.send(event).await;
        match sent {
            Ok(()) => {}
            Err(e @ SessionError::Encode(_)) => {
                // an event that cannot be encoded never will be
                pending.pop_front();
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        pending.pop_front();
    }
    Ok(())
}

/// Events still queued from the last frame, then the optional `error`, the
/// session's terminal events and `[DONE]`. Returns the number of events
/// written over the whole session.
async fn finalize(
    session: &mut StreamSession,
    mut writer: SseWriter,
    failure: Option<String>,
    pending: &mut VecDeque<UiEvent>,
) -> Result<usize, SessionError> {
    let mut out = Vec::new();
    if let Some(message) = failure {
        session.fail(message, &mut out);
    }
    session.finalize(&mut out);
    pending.extend(out);
    flush(&mut writer, pending).await?;
    writer.finish().await
}
