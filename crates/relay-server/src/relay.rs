use std::convert::Infallible;
use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionOptions;
use crate::session::{ChunkOutcome, Reassembler, SessionState, UpstreamEnd};
use crate::upstream::{BoxError, ByteStream};

/// Downstream body: raw delta bytes in upstream arrival order.
pub type DownstreamBody =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static>>;

/// Summary returned when a session task ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: uuid::Uuid,
    pub state: SessionState,
    pub chunks_read: u64,
    pub bytes_forwarded: u64,
}

/// One relay session: the open upstream body, its reassembly state and the
/// downstream sender. Dropping the session releases the upstream connection.
pub struct StreamSession {
    id: uuid::Uuid,
    upstream: ByteStream,
    reassembler: Reassembler,
    downstream: mpsc::Sender<Bytes>,
    chunks_read: u64,
    bytes_forwarded: u64,
}

enum Step {
    DownstreamClosed,
    Upstream(Option<Result<Bytes, BoxError>>),
}

impl StreamSession {
    pub fn new(
        upstream: ByteStream,
        downstream: mpsc::Sender<Bytes>,
        options: &SessionOptions,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            upstream,
            reassembler: Reassembler::new(options.pending_limit),
            downstream,
            chunks_read: 0,
            bytes_forwarded: 0,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Reads the upstream until the sentinel, end-of-input, a read error, or
    /// the downstream going away, forwarding deltas as they are committed.
    pub async fn run(mut self) -> SessionReport {
        let session_id = self.id;
        debug!(%session_id, "relay session started");
        loop {
            let step = tokio::select! {
                biased;
                () = self.downstream.closed() => Step::DownstreamClosed,
                next = self.upstream.next() => Step::Upstream(next),
            };

            let chunk = match step {
                Step::DownstreamClosed => {
                    info!(%session_id, "downstream disconnected; releasing upstream");
                    self.reassembler.fail();
                    break;
                }
                Step::Upstream(None) => {
                    if let UpstreamEnd::Premature { pending_len } =
                        self.reassembler.finish_upstream()
                    {
                        warn!(%session_id, pending_len, bytes_forwarded = self.bytes_forwarded, "upstream ended without termination sentinel");
                    }
                    break;
                }
                Step::Upstream(Some(Err(err))) => {
                    warn!(%session_id, error = %err, "upstream read failed mid-stream");
                    self.reassembler.fail();
                    break;
                }
                Step::Upstream(Some(Ok(chunk))) => chunk,
            };

            self.chunks_read += 1;
            match self.reassembler.push_chunk(&chunk) {
                ChunkOutcome::Forward(deltas) => {
                    if !self.forward(deltas).await {
                        info!(%session_id, "downstream disconnected; releasing upstream");
                        self.reassembler.fail();
                        break;
                    }
                }
                ChunkOutcome::Buffered { pending_len } => {
                    debug!(%session_id, pending_len, chunk_len = chunk.len(), "chunk ended mid-record");
                }
                ChunkOutcome::Terminated(deltas) => {
                    if !self.forward(deltas).await {
                        debug!(%session_id, "downstream gone before final deltas");
                    }
                    break;
                }
                ChunkOutcome::Overflow { pending_len } => {
                    warn!(%session_id, pending_len, "pending buffer exceeded limit; ending session");
                    break;
                }
                ChunkOutcome::Closed => break,
            }
        }

        let report = SessionReport {
            session_id,
            state: self.reassembler.state(),
            chunks_read: self.chunks_read,
            bytes_forwarded: self.bytes_forwarded,
        };
        info!(
            %session_id,
            state = ?report.state,
            chunks_read = report.chunks_read,
            bytes_forwarded = report.bytes_forwarded,
            "relay session finished"
        );
        report
    }

    async fn forward(&mut self, deltas: Vec<String>) -> bool {
        for delta in deltas {
            if delta.is_empty() {
                continue;
            }
            let len = delta.len() as u64;
            if self.downstream.send(Bytes::from(delta)).await.is_err() {
                return false;
            }
            self.bytes_forwarded += len;
        }
        true
    }
}

/// Starts a session task for an already-open upstream body.
///
/// Returns the downstream body and the task handle; the task ends on its own
/// when the body is dropped.
pub fn spawn_session(
    upstream: ByteStream,
    options: &SessionOptions,
) -> (DownstreamBody, JoinHandle<SessionReport>) {
    let (tx, rx) = mpsc::channel(options.downstream_buffer.max(1));
    let session = StreamSession::new(upstream, tx, options);
    let handle = tokio::spawn(session.run());
    (downstream_body(rx), handle)
}

fn downstream_body(rx: mpsc::Receiver<Bytes>) -> DownstreamBody {
    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|bytes| (Ok::<_, Infallible>(bytes), rx))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn upstream_of<I, S>(chunks: I) -> ByteStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks: Vec<Result<Bytes, BoxError>> = chunks
            .into_iter()
            .map(|c| Ok(Bytes::from(c.into())))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    async fn collect(mut body: DownstreamBody) -> String {
        let mut out = Vec::new();
        while let Some(Ok(bytes)) = body.next().await {
            out.extend_from_slice(&bytes);
        }
        String::from_utf8(out).expect("utf-8 downstream")
    }

    const HELLO: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n";
    const WORLD: &str = "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n";
    const DONE: &str = "data: [DONE]\n\n";

    #[tokio::test]
    async fn relays_deltas_and_terminates_on_sentinel() {
        let (body, handle) = spawn_session(
            upstream_of([format!("{HELLO}{WORLD}{DONE}")]),
            &SessionOptions::default(),
        );
        assert_eq!(collect(body).await, "Hello world");
        let report = handle.await.expect("session task");
        assert_eq!(report.state, SessionState::Terminated);
        assert_eq!(report.bytes_forwarded, 11);
    }

    #[tokio::test]
    async fn split_record_is_relayed_once() {
        let (body, handle) = spawn_session(
            upstream_of([
                "data: {\"choices\":[{\"delta\":{\"con",
                "tent\":\"Hi\"}}]}\n\n",
                DONE,
            ]),
            &SessionOptions::default(),
        );
        assert_eq!(collect(body).await, "Hi");
        let report = handle.await.expect("session task");
        assert_eq!(report.chunks_read, 3);
        assert_eq!(report.state, SessionState::Terminated);
    }

    #[tokio::test]
    async fn sentinel_first_closes_immediately() {
        let (body, handle) =
            spawn_session(upstream_of([DONE, HELLO]), &SessionOptions::default());
        assert_eq!(collect(body).await, "");
        let report = handle.await.expect("session task");
        assert_eq!(report.chunks_read, 1);
        assert_eq!(report.bytes_forwarded, 0);
    }

    #[tokio::test]
    async fn premature_upstream_end_keeps_partial_text() {
        let (body, handle) = spawn_session(upstream_of([HELLO]), &SessionOptions::default());
        assert_eq!(collect(body).await, "Hello");
        assert_eq!(handle.await.expect("session task").state, SessionState::Failed);
    }

    #[tokio::test]
    async fn upstream_read_error_ends_stream_without_in_band_error() {
        let upstream: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(HELLO.as_bytes())),
            Err::<Bytes, BoxError>("connection reset".into()),
            Ok(Bytes::from_static(WORLD.as_bytes())),
        ]));
        let (body, handle) = spawn_session(upstream, &SessionOptions::default());
        assert_eq!(collect(body).await, "Hello");
        assert_eq!(handle.await.expect("session task").state, SessionState::Failed);
    }

    #[tokio::test]
    async fn pending_limit_ends_a_stalled_session() {
        let options = SessionOptions {
            pending_limit: Some(16),
            ..SessionOptions::default()
        };
        let (body, handle) = spawn_session(
            upstream_of([HELLO, "data: <html>502</html>\n", WORLD, DONE]),
            &options,
        );
        assert_eq!(collect(body).await, "Hello");
        assert_eq!(handle.await.expect("session task").state, SessionState::Failed);
    }

    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dropped_downstream_releases_upstream() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = ReleaseFlag(released.clone());
        let upstream: ByteStream = Box::pin(
            stream::once(async { Ok::<_, BoxError>(Bytes::from_static(HELLO.as_bytes())) })
                .chain(stream::pending())
                .map(move |item| {
                    let _held = &flag;
                    item
                }),
        );

        let (mut body, handle) = spawn_session(upstream, &SessionOptions::default());
        let first = body.next().await.expect("first chunk").expect("infallible");
        assert_eq!(&first[..], b"Hello");
        drop(body);

        let report = handle.await.expect("session task");
        assert_eq!(report.state, SessionState::Failed);
        assert!(released.load(Ordering::SeqCst));
    }
}
