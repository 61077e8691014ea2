//! The two per-connection I/O loops.

use std::fmt;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use coeus_protocol::validate_inbound;

use super::{Completion, ConnectionId, ConnectionSettings, Frame, OutboundQueue};

/// Drains the outbound queue to the transport.
///
/// Write errors drop the message and move on; a write that does not finish
/// within the write timeout ends the connection. Between messages a ping is
/// sent every `ping_interval` so idle clients keep answering.
pub(crate) async fn outbound_pump<Si>(
    id: ConnectionId,
    mut queue: OutboundQueue,
    mut sink: Si,
    settings: ConnectionSettings,
    _done: Completion,
) where
    Si: Sink<Frame> + Unpin,
    Si::Error: fmt::Display,
{
    let closer = queue.closer();
    let mut keepalive = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            payload = queue.next() => match payload {
                Some(payload) => Frame::Text(payload.to_string()),
                None => {
                    debug!(connection = %id, "Outbound queue closed");
                    break;
                }
            },
            _ = keepalive.tick() => Frame::Ping(Vec::new()),
        };

        match timeout(settings.write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection = %id, error = %e, "Write failed, message dropped");
            }
            Err(_) => {
                warn!(connection = %id, "Write timed out, closing connection");
                break;
            }
        }
    }

    closer.cancel();

    if let Ok(Err(e)) = timeout(settings.write_timeout, sink.close()).await {
        trace!(connection = %id, error = %e, "Close frame not delivered");
    }
}

/// Reads from the transport until it fails, closes, goes idle, or the
/// connection is closed from the outbound side.
///
/// Messages are validated as JSON objects and discarded.
pub(crate) async fn inbound_pump<St, E>(
    id: ConnectionId,
    mut stream: St,
    closer: CancellationToken,
    read_timeout: Duration,
    _done: Completion,
) where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = closer.cancelled() => {
                trace!(connection = %id, "Inbound pump stopped by close");
                break;
            }
            next = timeout(read_timeout, stream.next()) => next,
        };

        let frame = match next {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(connection = %id, error = %e, "Read error");
                break;
            }
            Ok(None) => {
                debug!(connection = %id, "Peer closed the stream");
                break;
            }
            Err(_) => {
                debug!(connection = %id, timeout = ?read_timeout, "Read timed out");
                break;
            }
        };

        let payload = match &frame {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(bytes) => bytes.as_slice(),
            Frame::Ping(_) | Frame::Pong(_) => continue,
            Frame::Close => {
                debug!(connection = %id, "Peer sent close frame");
                break;
            }
        };

        if let Err(e) = validate_inbound(payload) {
            warn!(connection = %id, error = %e, "Malformed inbound message");
            break;
        }
        trace!(connection = %id, "Inbound message discarded");
    }

    closer.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{outbound_channel, Delivery, Payload, ShutdownLatch};
    use futures::channel::mpsc as fmpsc;
    use std::sync::Arc;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            outbound_capacity: 4,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(1),
            ping_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_outbound_pump_writes_in_order_and_stops_on_close() {
        let (outbound, queue) = outbound_channel(4);
        let (sink, mut written) = fmpsc::unbounded::<Frame>();
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        let pump = tokio::spawn(outbound_pump(outbound.id(), queue, sink, settings(), done));

        let first: Payload = Arc::from("one");
        let second: Payload = Arc::from("two");
        assert_eq!(outbound.try_deliver(&first), Delivery::Delivered);
        assert_eq!(outbound.try_deliver(&second), Delivery::Delivered);

        assert_eq!(written.next().await, Some(Frame::Text("one".into())));
        assert_eq!(written.next().await, Some(Frame::Text("two".into())));

        outbound.close();
        latch.wait().await;
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn test_outbound_pump_ignores_write_errors() {
        let (outbound, queue) = outbound_channel(4);
        let (sink, written) = fmpsc::unbounded::<Frame>();
        drop(written);
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        tokio::spawn(outbound_pump(outbound.id(), queue, sink, settings(), done));

        let payload: Payload = Arc::from("lost");
        assert_eq!(outbound.try_deliver(&payload), Delivery::Delivered);
        tokio::task::yield_now().await;
        assert!(!outbound.is_closed(), "a failed write must not end the connection");

        outbound.close();
        latch.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_pump_sends_keepalive_pings() {
        let (outbound, queue) = outbound_channel(1);
        let (sink, mut written) = fmpsc::unbounded::<Frame>();
        let (_latch, done, _other) = ShutdownLatch::pair();
        let mut settings = settings();
        settings.ping_interval = Duration::from_secs(30);

        tokio::spawn(outbound_pump(outbound.id(), queue, sink, settings, done));

        assert_eq!(written.next().await, Some(Frame::Ping(Vec::new())));
        outbound.close();
    }

    #[tokio::test]
    async fn test_inbound_pump_discards_valid_messages() {
        let (outbound, queue) = outbound_channel(1);
        let (frames, stream) = fmpsc::unbounded::<Result<Frame, String>>();
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        tokio::spawn(inbound_pump(
            outbound.id(),
            stream,
            queue.closer(),
            Duration::from_secs(5),
            done,
        ));

        frames.unbounded_send(Ok(Frame::Text(r#"{"hello":1}"#.into()))).unwrap();
        frames.unbounded_send(Ok(Frame::Pong(Vec::new()))).unwrap();
        tokio::task::yield_now().await;
        assert!(!queue.is_closed());

        frames.unbounded_send(Ok(Frame::Close)).unwrap();
        latch.wait().await;
        assert!(queue.is_closed(), "inbound exit must close the connection");
    }

    #[tokio::test]
    async fn test_inbound_pump_stops_on_malformed_payload() {
        let (outbound, queue) = outbound_channel(1);
        let (frames, stream) = fmpsc::unbounded::<Result<Frame, String>>();
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        tokio::spawn(inbound_pump(
            outbound.id(),
            stream,
            queue.closer(),
            Duration::from_secs(5),
            done,
        ));

        frames.unbounded_send(Ok(Frame::Binary(b"[1,2,3]".to_vec()))).unwrap();
        latch.wait().await;
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_inbound_pump_stops_on_read_error() {
        let (outbound, queue) = outbound_channel(1);
        let (frames, stream) = fmpsc::unbounded::<Result<Frame, String>>();
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        tokio::spawn(inbound_pump(
            outbound.id(),
            stream,
            queue.closer(),
            Duration::from_secs(5),
            done,
        ));

        frames.unbounded_send(Err("connection reset".to_string())).unwrap();
        latch.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_pump_times_out_silent_peer() {
        let (outbound, queue) = outbound_channel(1);
        let (_frames, stream) = fmpsc::unbounded::<Result<Frame, String>>();
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        tokio::spawn(inbound_pump(
            outbound.id(),
            stream,
            queue.closer(),
            Duration::from_secs(75),
            done,
        ));

        latch.wait().await;
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_inbound_pump_stops_when_outbound_closes() {
        let (outbound, queue) = outbound_channel(1);
        let (_frames, stream) = fmpsc::unbounded::<Result<Frame, String>>();
        let (mut latch, done, other) = ShutdownLatch::pair();
        drop(other);

        tokio::spawn(inbound_pump(
            outbound.id(),
            stream,
            queue.closer(),
            Duration::from_secs(600),
            done,
        ));

        outbound.close();
        latch.wait().await;
    }
}
