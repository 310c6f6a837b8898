//! Peer transport boundary
//!
//! [`PeerTransport`] is the only network-shaped seam of the coordinator.
//! Every method returns immediately; completions are delivered later as
//! [`PeerEvent`]s on the channel the transport was built with, so the
//! coordinator's queue stays the single place where state changes.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sunface_core::prelude::*;
use sunface_core::{FetchOutcome, PeerEvent, RequestId};

use crate::protocol::{encode_request, parse_peer_message};

/// Sender half the transport reports completions on
pub type PeerEventSender = mpsc::Sender<PeerEvent>;

/// Capacity of the outbound request channel (bounded, to apply backpressure).
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

/// Default timeout for establishing a TCP link.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Non-blocking access to the paired peer
pub trait PeerTransport: Send + fmt::Debug {
    /// Begin connect attempt `attempt`.
    ///
    /// Completes with `PeerEvent::Connected` or `PeerEvent::ConnectionFailed`
    /// carrying the same attempt number.
    fn connect(&mut self, attempt: u64);

    /// Send fetch request `id`. Completes with `PeerEvent::Response`.
    fn send_request(&mut self, id: RequestId);

    /// Tear the link down. No further events are delivered for it.
    fn disconnect(&mut self);
}

/// Report a completion without blocking the caller
pub(crate) fn deliver(events: &PeerEventSender, event: PeerEvent) {
    if let Err(e) = events.try_send(event) {
        warn!("Dropping peer event, coordinator queue unavailable: {}", e);
    }
}

/// Failure event for `attempt`, carrying the error's display text
fn link_failed(attempt: u64, err: Error) -> PeerEvent {
    warn!("Peer link attempt #{} failed: {}", attempt, err);
    PeerEvent::ConnectionFailed {
        attempt,
        reason: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// LineTransport
// ---------------------------------------------------------------------------

/// Newline-delimited JSON over TCP.
///
/// Each connect attempt spawns one background task that owns the socket.
/// Requests are queued on a bounded channel to that task; inbound lines are
/// parsed into [`PeerEvent`]s.
pub struct LineTransport {
    address: String,
    connect_timeout: Duration,
    events: PeerEventSender,
    outbound: Option<mpsc::Sender<String>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineTransport")
            .field("address", &self.address)
            .field("connect_timeout", &self.connect_timeout)
            .field("active", &self.task.is_some())
            .finish()
    }
}

impl LineTransport {
    pub fn new(address: impl Into<String>, events: PeerEventSender) -> Self {
        Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            events,
            outbound: None,
            task: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn abort_task(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl PeerTransport for LineTransport {
    fn connect(&mut self, attempt: u64) {
        self.abort_task();

        let (out_tx, out_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);
        self.outbound = Some(out_tx);

        let address = self.address.clone();
        let timeout = self.connect_timeout;
        let events = self.events.clone();

        debug!("Connecting to peer at {} (attempt #{})", address, attempt);
        self.task = Some(tokio::spawn(async move {
            let stream = match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    let err = Error::connection(format!("connect to {} failed: {}", address, e));
                    let _ = events.send(link_failed(attempt, err)).await;
                    return;
                }
                Err(_) => {
                    let err = Error::connection(format!(
                        "connect to {} timed out after {:?}",
                        address, timeout
                    ));
                    let _ = events.send(link_failed(attempt, err)).await;
                    return;
                }
            };
            run_link(stream, attempt, out_rx, events).await;
        }));
    }

    fn send_request(&mut self, id: RequestId) {
        let sent = self
            .outbound
            .as_ref()
            .map(|tx| tx.try_send(encode_request(id)).is_ok())
            .unwrap_or(false);

        if !sent {
            warn!("Could not queue request #{} to peer", id);
            deliver(
                &self.events,
                PeerEvent::Response {
                    id,
                    outcome: FetchOutcome::NoData {
                        message: Error::connection("peer link not ready").to_string(),
                    },
                },
            );
        }
    }

    fn disconnect(&mut self) {
        if self.task.is_some() {
            debug!("Disconnecting from peer at {}", self.address);
        }
        self.abort_task();
    }
}

impl Drop for LineTransport {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Drive one established link until it closes.
///
/// Reports `Connected` first. EOF from the peer is a suspension; an I/O
/// error is a failure of `attempt`.
pub async fn run_link<S>(
    stream: S,
    attempt: u64,
    mut outbound: mpsc::Receiver<String>,
    events: PeerEventSender,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if events.send(PeerEvent::Connected { attempt }).await.is_err() {
        return;
    }

    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_peer_message(&line) {
                    Ok(Some(msg)) => {
                        if events.send(msg.into()).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    // A bad line is skipped; the link stays up
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => {
                    info!("Peer closed the link");
                    let _ = events.send(PeerEvent::ConnectionSuspended).await;
                    return;
                }
                Err(e) => {
                    let err = Error::connection(format!("read failed: {}", e));
                    let _ = events.send(link_failed(attempt, err)).await;
                    return;
                }
            },
            request = outbound.recv() => {
                let Some(mut request) = request else {
                    // Transport side dropped: deliberate disconnect
                    return;
                };
                request.push('\n');
                let written = async {
                    writer.write_all(request.as_bytes()).await?;
                    writer.flush().await
                }
                .await;
                if let Err(e) = written {
                    let err = Error::connection(format!("write failed: {}", e));
                    let _ = events.send(link_failed(attempt, err)).await;
                    return;
                }
            }
        }
    }
}
