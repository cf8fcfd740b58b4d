//! Engine timers
//!
//! Owns the two periodic tasks: the 1 s elapsed-time tick and the 30 s panel
//! reconciliation. Each fires a `ScheduledTask` into the engine's queue. All
//! timers are aborted by `stop` or when the scheduler is dropped.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::SchedulerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Refresh elapsed-time labels
    Tick,
    /// Re-place every token on the panels
    Reconcile,
}

pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the timers. The first firing of each is one interval from now.
    pub fn start<T>(config: &SchedulerConfig, tx: mpsc::UnboundedSender<T>) -> Self
    where
        T: From<ScheduledTask> + Send + 'static,
    {
        let handles = vec![
            spawn_timer(ScheduledTask::Tick, config.tick_interval(), tx.clone()),
            spawn_timer(ScheduledTask::Reconcile, config.reconcile_interval(), tx),
        ];
        info!(
            tick_ms = config.tick_interval_ms,
            reconcile_secs = config.reconcile_interval_secs,
            "Scheduler started"
        );
        Self { handles }
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Abort all timers
    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_timer<T>(task: ScheduledTask, period: Duration, tx: mpsc::UnboundedSender<T>) -> JoinHandle<()>
where
    T: From<ScheduledTask> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if tx.send(T::from(task)).is_err() {
                debug!(task = ?task, "Engine gone, timer exiting");
                break;
            }
        }
    })
}
