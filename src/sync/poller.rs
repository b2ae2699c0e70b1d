use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::engine::{PassReport, SyncEngine};
use super::error::SyncError;
use crate::store::{FeedId, ObservableStore};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Poller is not running")]
    Unavailable,
    #[error(transparent)]
    Sync(#[from] SyncError),
}

type StoreJob = Box<dyn FnOnce(&mut ObservableStore) + Send>;

enum PollerMessage {
    Submit {
        url: String,
        reply: oneshot::Sender<Result<FeedId, SyncError>>,
    },
    SyncNow {
        reply: oneshot::Sender<PassReport>,
    },
    WithStore(StoreJob),
    Shutdown,
}

/// Cloneable handle to a running [`Poller`].
#[derive(Clone, Debug)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerMessage>,
}

impl PollerHandle {
    /// Registers a feed through the poller task.
    pub async fn submit(&self, url: impl Into<String>) -> Result<FeedId, PollerError> {
        let (reply, rx) = oneshot::channel();
        self.send(PollerMessage::Submit {
            url: url.into(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| PollerError::Unavailable)??)
    }

    /// Runs a pass now. The next scheduled pass is pushed back a full
    /// interval from when this one finishes.
    pub async fn sync_now(&self) -> Result<PassReport, PollerError> {
        let (reply, rx) = oneshot::channel();
        self.send(PollerMessage::SyncNow { reply }).await?;
        rx.await.map_err(|_| PollerError::Unavailable)
    }

    /// Runs `f` against the store on the poller task, between passes.
    pub async fn with_store<F, R>(&self, f: F) -> Result<R, PollerError>
    where
        F: FnOnce(&mut ObservableStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.send(PollerMessage::WithStore(Box::new(move |store| {
            let _ = reply.send(f(store));
        })))
        .await?;
        rx.await.map_err(|_| PollerError::Unavailable)
    }

    /// Asks the poller to stop after the current operation. Does nothing if
    /// it has already stopped.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(PollerMessage::Shutdown).await;
    }

    async fn send(&self, msg: PollerMessage) -> Result<(), PollerError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| PollerError::Unavailable)
    }
}

impl std::fmt::Debug for PollerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerMessage::Submit { url, .. } => f.debug_struct("Submit").field("url", url).finish(),
            PollerMessage::SyncNow { .. } => f.write_str("SyncNow"),
            PollerMessage::WithStore(_) => f.write_str("WithStore"),
            PollerMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Drives [`SyncEngine::run_pass`] on a fixed delay.
///
/// The first pass runs as soon as [`Poller::run`] starts; each following
/// pass starts `interval` after the previous one finished, whatever its
/// outcome. Commands from [`PollerHandle`]s are handled between passes; a
/// pass that is due runs before any queued command. The
/// loop ends on [`PollerHandle::shutdown`] or once every handle is dropped,
/// and hands the engine back.
pub struct Poller {
    engine: SyncEngine,
    interval: Duration,
    receiver: mpsc::Receiver<PollerMessage>,
}

impl Poller {
    pub fn new(engine: SyncEngine, interval: Duration) -> (Self, PollerHandle) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        (
            Self {
                engine,
                interval,
                receiver,
            },
            PollerHandle { sender },
        )
    }

    pub async fn run(mut self) -> SyncEngine {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            "Poller started"
        );

        self.engine.run_pass().await;
        let sleep = tokio::time::sleep(self.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;

                () = &mut sleep => {
                    self.engine.run_pass().await;
                    sleep.as_mut().reset(Instant::now() + self.interval);
                }
                msg = self.receiver.recv() => match msg {
                    None | Some(PollerMessage::Shutdown) => break,
                    Some(PollerMessage::SyncNow { reply }) => {
                        let report = self.engine.run_pass().await;
                        let _ = reply.send(report);
                        sleep.as_mut().reset(Instant::now() + self.interval);
                    }
                    Some(PollerMessage::Submit { url, reply }) => {
                        let result = self.engine.submit_candidate(&url).await;
                        let _ = reply.send(result);
                    }
                    Some(PollerMessage::WithStore(job)) => job(self.engine.store_mut()),
                },
            }
        }

        tracing::info!("Poller stopped");
        self.engine
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("engine", &self.engine)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
