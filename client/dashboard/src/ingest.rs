//! Telemetry Ingestor: owns the single feed connection and forwards decoded
//! updates to the presentation root over an unbounded channel.

use chrono::{DateTime, Local};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc::UnboundedSender, Notify},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};
use url::Url;

use crate::envelope::{decode_frame, Frame, TelemetryUpdate};
use crate::error::DashboardError;

#[derive(Debug)]
pub enum IngestEvent {
    Connected,
    Telemetry {
        update: TelemetryUpdate,
        observed_at: DateTime<Local>,
    },
    /// The feed is gone for good; no reconnect follows.
    Closed,
}

#[derive(Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    pub fn stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent stop is not missed.
        notified.as_mut().enable();
        if self.stopped() {
            return;
        }
        notified.await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns one text frame into an event, or nothing when the frame is ignored
/// or malformed.
pub fn handle_text(text: &str, observed_at: DateTime<Local>) -> Option<IngestEvent> {
    match decode_frame(text) {
        Ok(Frame::Telemetry(update)) => Some(IngestEvent::Telemetry {
            update,
            observed_at,
        }),
        Ok(Frame::Other(kind)) => {
            tracing::debug!(%kind, "ignoring feed message");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "dropping malformed frame");
            None
        }
    }
}

pub fn spawn(
    endpoint: Url,
    events: UnboundedSender<IngestEvent>,
    stop: StopSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = run(endpoint, events, stop).await {
            tracing::warn!(error = %err, "telemetry feed ended");
        }
    })
}

/// Subscribes once and pumps frames until the peer closes, the transport
/// fails, or `stop` fires. Always ends with [`IngestEvent::Closed`].
pub async fn run(
    endpoint: Url,
    events: UnboundedSender<IngestEvent>,
    stop: StopSignal,
) -> Result<(), DashboardError> {
    let outcome = subscribe(&endpoint, &events, &stop).await;
    let _ = events.send(IngestEvent::Closed);
    outcome
}

async fn subscribe(
    endpoint: &Url,
    events: &UnboundedSender<IngestEvent>,
    stop: &StopSignal,
) -> Result<(), DashboardError> {
    let connect = tokio::select! {
        result = connect_async(endpoint.as_str()) => result,
        _ = stop.wait() => return Ok(()),
    };
    let (stream, _response) = connect.map_err(|source| DashboardError::Connect {
        endpoint: endpoint.to_string(),
        source,
    })?;
    tracing::info!(%endpoint, "connected to telemetry feed");
    let _ = events.send(IngestEvent::Connected);

    let mut subscription = Subscription::new(stream);
    let outcome = subscription.pump(events, stop).await;
    subscription.close().await;
    outcome
}

struct Subscription<S> {
    stream: S,
    closed: bool,
}

impl<S> Subscription<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    async fn pump(
        &mut self,
        events: &UnboundedSender<IngestEvent>,
        stop: &StopSignal,
    ) -> Result<(), DashboardError> {
        loop {
            let frame = tokio::select! {
                biased;
                _ = stop.wait() => {
                    tracing::info!("telemetry feed stopping");
                    return Ok(());
                }
                frame = self.stream.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(event) = handle_text(&text, Local::now()) else {
                        continue;
                    };
                    if events.send(event).is_err() {
                        // Nobody renders anymore.
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    // The close reply goes out on the next read.
                    tracing::info!(?frame, "feed closed by server");
                    self.closed = true;
                }
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => {
                    self.closed = true;
                    return Ok(());
                }
                Some(Err(err)) => {
                    self.closed = true;
                    return Err(err.into());
                }
            }
        }
    }

    /// Sends our close frame unless the connection is already closing.
    async fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        if let Err(err) = SinkExt::close(&mut self.stream).await {
            tracing::debug!(error = %err, "close handshake failed");
        }
    }
}
