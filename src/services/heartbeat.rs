/// Keep-alive task for a ready connection.
/// Emits a heartbeat-ask frame every interval through the shared writer.
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::protocol::framer::FrameWriter;
use crate::protocol::packet;

pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Start the loop. It ends when `is_live` reports false or as soon as
    /// `stop` flips to true. A failed write calls `on_dead` before exiting,
    /// since a frame cut short leaves the stream unusable.
    pub fn spawn<F, D>(
        writer: FrameWriter,
        interval: Duration,
        stop: watch::Receiver<bool>,
        is_live: F,
        on_dead: D,
    ) -> Self
    where
        F: Fn() -> bool + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(Self::run(writer, interval, stop, is_live, on_dead));
        Self { handle }
    }

    async fn run<F, D>(
        writer: FrameWriter,
        interval: Duration,
        mut stop: watch::Receiver<bool>,
        is_live: F,
        on_dead: D,
    ) where
        F: Fn() -> bool,
        D: FnOnce(),
    {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;

        let frame = packet::heartbeat_ask();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.wait_for(|stopped| *stopped) => break,
            }
            if *stop.borrow() || !is_live() {
                break;
            }
            if let Err(e) = writer.write_frame(&frame).await {
                warn!("Heartbeat write failed, dropping connection: {}", e);
                on_dead();
                break;
            }
            trace!("heartbeat sent");
        }
        debug!("Heartbeat loop finished");
    }

    /// Cancel the loop and wait until it can no longer write.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::CmdType;
    use crate::protocol::framer::FrameReader;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_sends_heartbeats_until_stopped() {
        let (client, server) = tokio::io::duplex(1024);
        let writer = FrameWriter::new(client, Duration::from_secs(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        let hb = Heartbeat::spawn(writer, Duration::from_millis(10), stop_rx, || true, || {});

        let mut reader = FrameReader::new(server, Duration::from_secs(1));
        for _ in 0..3 {
            assert_eq!(reader.read_frame().await.unwrap().cmd, CmdType::HEARTBEAT_ASK);
        }

        stop_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(hb.is_finished());
        hb.stop().await;
    }

    #[tokio::test]
    async fn test_exits_when_not_live() {
        let (client, _server) = tokio::io::duplex(1024);
        let writer = FrameWriter::new(client, Duration::from_secs(1));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let live = Arc::new(AtomicBool::new(false));
        let flag = live.clone();

        let hb = Heartbeat::spawn(
            writer,
            Duration::from_millis(5),
            stop_rx,
            move || flag.load(Ordering::SeqCst),
            || {},
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(hb.is_finished());
    }

    #[tokio::test]
    async fn test_write_failure_marks_dead() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let writer = FrameWriter::new(client, Duration::from_secs(1));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let dead = Arc::new(AtomicBool::new(false));
        let flag = dead.clone();

        let hb = Heartbeat::spawn(writer, Duration::from_millis(5), stop_rx, || true, move || {
            flag.store(true, Ordering::SeqCst)
        });
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(hb.is_finished());
        assert!(dead.load(Ordering::SeqCst));
    }
}
