use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::config::PanelConfig;
use crate::hal::DevicePropertySource;
use super::commit::{self, CommitPlan, CommitReport};
use super::detector::{self, Displayed};
use super::engine::{BufferRebuild, ReconcileRequest, ReconciliationEngine};
use super::state::{ChangeNotifier, PanelEvent, PanelSnapshot};

/// How a reconciliation attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Fresh snapshot matched what is displayed when it reached the owner,
    /// or no drift was seen
    Unchanged,
    /// Lists and indices were rebuilt on the owner task
    Applied,
    /// The panel was disposed (or its owner task is gone) before applying
    Discarded,
}

/// Messages processed, in order, by the owner task
enum Command {
    Snapshot(oneshot::Sender<PanelSnapshot>),
    Displayed(oneshot::Sender<Displayed>),
    SetDeviceIndex(usize, oneshot::Sender<bool>),
    SetSampleRateIndex(Option<usize>, oneshot::Sender<bool>),
    SetBufferSizeIndex(Option<usize>, oneshot::Sender<bool>),
    PlanCommit(oneshot::Sender<Option<CommitPlan>>),
    /// Cold load, applied unconditionally
    Load(ReconcileRequest, oneshot::Sender<ReconcileOutcome>),
    /// Detector result, checked against the state as it is now
    Reconcile(ReconcileRequest, oneshot::Sender<ReconcileOutcome>),
}

/// Sole owner of the reconciliation engine. Nothing else mutates it.
async fn run_owner(
    mut engine: ReconciliationEngine,
    mut rx: mpsc::UnboundedReceiver<Command>,
    disposed: Arc<AtomicBool>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(engine.snapshot());
            }
            Command::Displayed(reply) => {
                let _ = reply.send(engine.displayed());
            }
            Command::SetDeviceIndex(index, reply) => {
                let _ = reply.send(engine.set_device_index(index));
            }
            Command::SetSampleRateIndex(index, reply) => {
                let _ = reply.send(engine.set_sample_rate_index(index));
            }
            Command::SetBufferSizeIndex(index, reply) => {
                let _ = reply.send(engine.set_buffer_size_index(index));
            }
            Command::PlanCommit(reply) => {
                let _ = reply.send(CommitPlan::capture(&engine));
            }
            Command::Load(request, reply) => {
                let outcome = if disposed.load(Ordering::Acquire) {
                    debug!("panel disposed, discarding load");
                    ReconcileOutcome::Discarded
                } else {
                    engine.apply(request);
                    ReconcileOutcome::Applied
                };
                let _ = reply.send(outcome);
            }
            Command::Reconcile(request, reply) => {
                let outcome = if disposed.load(Ordering::Acquire) {
                    debug!("panel disposed, discarding reconciliation");
                    ReconcileOutcome::Discarded
                } else if engine.reconcile(request) {
                    ReconcileOutcome::Applied
                } else {
                    ReconcileOutcome::Unchanged
                };
                let _ = reply.send(outcome);
            }
        }
    }

    debug!("panel owner task finished");
}

/// Cloneable route from worker tasks back to the owner task
#[derive(Clone)]
struct Link {
    tx: mpsc::UnboundedSender<Command>,
    source: Arc<dyn DevicePropertySource>,
    disposed: Arc<AtomicBool>,
}

impl Link {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(command(reply_tx)).is_err() {
            warn!("panel owner task has stopped");
            return None;
        }
        reply_rx.await.ok()
    }

    async fn marshal(&self, request: ReconcileRequest) -> ReconcileOutcome {
        self.request(|reply| Command::Reconcile(request, reply))
            .await
            .unwrap_or(ReconcileOutcome::Discarded)
    }

    async fn load(&self) -> ReconcileOutcome {
        info!("loading devices");

        let fresh = self.source.enumerate().await;
        let preferred_path = detector::designated_path(self.source.as_ref(), &fresh).await;

        let request = ReconcileRequest {
            devices: Arc::from(fresh),
            preferred_path,
            buffer_rebuild: BufferRebuild::Search,
        };
        self.request(|reply| Command::Load(request, reply))
            .await
            .unwrap_or(ReconcileOutcome::Discarded)
    }

    async fn device_changed(&self) -> ReconcileOutcome {
        info!("device change detected");

        let Some(displayed) = self.request(Command::Displayed).await else {
            return ReconcileOutcome::Discarded;
        };
        let request = detector::on_device_changed(self.source.as_ref(), &displayed).await;
        self.marshal(request).await
    }

    async fn poll(&self) -> ReconcileOutcome {
        let Some(displayed) = self.request(Command::Displayed).await else {
            return ReconcileOutcome::Discarded;
        };
        match detector::poll_sample_rate(self.source.as_ref(), &displayed).await {
            Some(request) => self.marshal(request).await,
            None => ReconcileOutcome::Unchanged,
        }
    }
}

/// Poll timer task plus the signal that stops it between ticks
struct PollTimer {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PollTimer {
    fn spawn(link: Link, period: Duration) -> Self {
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = &mut stop_rx => break,
                }

                // A poll already under way runs to completion; the owner
                // discards its result if the panel was disposed meanwhile.
                if link.poll().await == ReconcileOutcome::Applied {
                    debug!("poll: display updated");
                }
            }
        });

        Self { stop, task }
    }

    fn stop(self) {
        let _ = self.stop.send(());
        // Detached, not aborted
        drop(self.task);
    }
}

/// Forwards OS device-change notifications into the panel.
///
/// Safe to call from any thread, including ones outside the tokio runtime.
#[derive(Clone)]
pub struct DeviceChangeHook {
    link: Link,
    runtime: Handle,
}

impl DeviceChangeHook {
    pub fn notify(&self) -> JoinHandle<ReconcileOutcome> {
        let link = self.link.clone();
        self.runtime.spawn(async move { link.device_changed().await })
    }
}

/// Presentation-facing control panel.
///
/// Owns a task that holds the selection state; every method posts to that
/// task and awaits its reply. Hardware I/O runs on the calling task.
pub struct AsioPanel {
    link: Link,
    notifier: ChangeNotifier,
    timer: Mutex<Option<PollTimer>>,
}

impl AsioPanel {
    /// Spawn the owner task and the poll timer. Must be called within a tokio runtime.
    pub fn start(source: Arc<dyn DevicePropertySource>, config: &PanelConfig) -> Self {
        let notifier = ChangeNotifier::new(config.event_capacity);
        let engine = ReconciliationEngine::new(config.diagnostic, notifier.clone());
        let disposed = Arc::new(AtomicBool::new(false));

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_owner(engine, rx, Arc::clone(&disposed)));

        let link = Link { tx, source, disposed };

        let timer = config
            .poll_interval()
            .map(|period| PollTimer::spawn(link.clone(), period));

        info!(
            "panel started (poll {:?}, diagnostic {})",
            config.poll_interval(),
            config.diagnostic
        );

        Self {
            link,
            notifier,
            timer: Mutex::new(timer),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.notifier.subscribe()
    }

    /// Must be called within a tokio runtime.
    pub fn device_change_hook(&self) -> DeviceChangeHook {
        DeviceChangeHook {
            link: self.link.clone(),
            runtime: Handle::current(),
        }
    }

    /// Enumerate and select the driver's designated device.
    pub async fn load_initial_state(&self) -> ReconcileOutcome {
        self.link.load().await
    }

    /// Re-enumerate after an OS device-change notification.
    pub async fn device_changed(&self) -> ReconcileOutcome {
        self.link.device_changed().await
    }

    /// Run one drift poll immediately.
    pub async fn poll_now(&self) -> ReconcileOutcome {
        self.link.poll().await
    }

    pub async fn snapshot(&self) -> Option<PanelSnapshot> {
        self.link.request(Command::Snapshot).await
    }

    pub async fn set_device_index(&self, index: usize) -> bool {
        self.link
            .request(|reply| Command::SetDeviceIndex(index, reply))
            .await
            .unwrap_or(false)
    }

    pub async fn set_sample_rate_index(&self, index: Option<usize>) -> bool {
        self.link
            .request(|reply| Command::SetSampleRateIndex(index, reply))
            .await
            .unwrap_or(false)
    }

    pub async fn set_buffer_size_index(&self, index: Option<usize>) -> bool {
        self.link
            .request(|reply| Command::SetBufferSizeIndex(index, reply))
            .await
            .unwrap_or(false)
    }

    /// Push the confirmed configuration to hardware.
    /// `None` when no device is selected.
    pub async fn confirm(&self) -> Option<CommitReport> {
        info!("user confirmed configuration");

        let plan = self.link.request(Command::PlanCommit).await.flatten()?;
        Some(commit::execute(&plan, self.link.source.as_ref()).await)
    }

    /// Stop polling and discard any reconciliation still in flight.
    pub fn dispose(&self) {
        if self.link.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("panel disposed");

        if let Some(timer) = self.timer.lock().take() {
            debug!("polling timer stopped");
            timer.stop();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.link.disposed.load(Ordering::Acquire)
    }
}

impl Drop for AsioPanel {
    fn drop(&mut self) {
        self.dispose();
    }
}
