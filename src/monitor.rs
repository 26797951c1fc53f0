use std::future::Future;
use std::io;
use std::sync::Arc;

use futures::stream::{Stream, StreamExt};
use slog::{error, info, Logger};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_stream::wrappers::{ReceiverStream, SplitStream};

use crate::error::MonitorError;
use crate::session::{AcquisitionStats, Session};

/// Drives a shared [`Session`] from a line source and a fixed-rate ticker.
///
/// The monitor is the only writer; readers take the lock briefly to copy what
/// they need, usually via [`Session::snapshot`].
pub struct Monitor {
    session: Arc<RwLock<Session>>,
    tick_interval: Duration,
    log: Logger,
}

impl Monitor {
    pub fn new(session: Session, log: Option<Logger>) -> Self {
        let tick_interval = session.config().tick_interval();
        Self {
            session: Arc::new(RwLock::new(session)),
            tick_interval,
            log: crate::log::or_discard(log),
        }
    }

    pub fn session(&self) -> Arc<RwLock<Session>> {
        self.session.clone()
    }

    /// Runs until the line source ends or fails.
    pub async fn run<S>(&self, lines: S) -> Result<AcquisitionStats, MonitorError>
    where
        S: Stream<Item = io::Result<String>> + Unpin,
    {
        self.run_until(lines, futures::future::pending()).await
    }

    /// Like [`Monitor::run`], but also returns once `shutdown` completes.
    /// Frames still queued at shutdown are discarded with the stop.
    pub async fn run_until<S, F>(
        &self,
        mut lines: S,
        shutdown: F,
    ) -> Result<AcquisitionStats, MonitorError>
    where
        S: Stream<Item = io::Result<String>> + Unpin,
        F: Future<Output = ()>,
    {
        self.session.write().await.start();

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(self.log, "shutdown requested");
                    break Ok(());
                }
                line = lines.next() => match line {
                    Some(Ok(line)) => {
                        self.session.write().await.push_frame(&line);
                    }
                    Some(Err(e)) => {
                        error!(self.log, "line source failed"; "error" => %e);
                        break Err(MonitorError::Source(e));
                    }
                    None => {
                        let mut session = self.session.write().await;
                        while session.pending() > 0 {
                            session.tick();
                        }
                        info!(self.log, "line source ended");
                        break Ok(());
                    }
                },
                _ = ticker.tick() => {
                    self.session.write().await.tick();
                }
            }
        };

        let mut session = self.session.write().await;
        session.stop();
        let stats = session.stats();
        info!(self.log, "monitor finished";
            "frames" => stats.frames_buffered,
            "dropped" => stats.frames_dropped,
            "analyses" => stats.analyses);
        outcome.map(|_| stats)
    }
}

/// Line source over any buffered async reader, such as a serial port.
///
/// Bytes that are not UTF-8 are replaced rather than failing the stream, so a
/// garbled line reaches the decoder and is dropped there.
pub fn lines_from<R>(reader: R) -> impl Stream<Item = io::Result<String>> + Unpin
where
    R: AsyncBufRead + Unpin,
{
    SplitStream::new(reader.split(b'\n')).map(|line| {
        line.map(|bytes| {
            let text = String::from_utf8_lossy(&bytes);
            text.strip_suffix('\r').unwrap_or(&text[..]).to_string()
        })
    })
}

/// Line source over a channel, as fed by [`crate::mock::mock_loop`].
pub fn lines_from_channel(
    rx: mpsc::Receiver<String>,
) -> impl Stream<Item = io::Result<String>> + Unpin {
    ReceiverStream::new(rx).map(Ok)
}
