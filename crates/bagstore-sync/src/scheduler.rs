use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Gate between reconciliation passes.
#[async_trait]
pub trait Ticker: Send {
    /// Wait until the next pass is due. `false` means no pass will ever be
    /// due again and the loop should stop.
    async fn tick(&mut self) -> bool;
}

/// Waits a full `period` from each call, so consecutive passes are always
/// separated by at least one period of rest however long a pass runs.
pub struct IntervalTicker {
    period: Duration,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        sleep(self.period).await;
        true
    }
}

/// Fires only when its [`TickHandle`] says so.
pub struct ManualTicker {
    rx: mpsc::Receiver<()>,
}

/// Trigger side of a [`ManualTicker`]. Dropping every handle stops the
/// ticker.
#[derive(Clone, Debug)]
pub struct TickHandle {
    tx: mpsc::Sender<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::channel(16);
        (Self { rx }, TickHandle { tx })
    }
}

impl TickHandle {
    /// Request one pass. Returns `false` if the ticker is gone.
    pub async fn tick(&self) -> bool {
        self.tx.send(()).await.is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
