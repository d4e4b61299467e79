use crate::application::services::{NotificationDispatcher, SlaEvaluator};
use crate::domain::errors::SlaResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Owns the SLA background loops: the applied-SLA evaluator, the SLA-event
/// evaluator and the notification dispatcher.
///
/// All loops share one shutdown token. On shutdown a loop finishes the row it
/// is working on, stops its pass and exits; `close` waits for every loop.
pub struct SlaWorker {
    evaluator: SlaEvaluator,
    dispatcher: NotificationDispatcher,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl SlaWorker {
    pub fn new(evaluator: SlaEvaluator, dispatcher: NotificationDispatcher) -> Self {
        Self {
            evaluator,
            dispatcher,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Token observed by every loop; cancelling it has the same effect as `close`
    /// without waiting.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start both evaluation loops in the background.
    pub fn run(&self, interval: Duration) {
        let evaluator = self.evaluator.clone();
        let token = self.shutdown.clone();
        self.tasks.spawn(tick_loop(
            "applied_sla",
            interval,
            self.shutdown.clone(),
            move || {
                let evaluator = evaluator.clone();
                let token = token.clone();
                async move { evaluator.evaluate_pending_slas(&token).await }
            },
        ));

        let evaluator = self.evaluator.clone();
        let token = self.shutdown.clone();
        self.tasks.spawn(tick_loop(
            "sla_event",
            interval,
            self.shutdown.clone(),
            move || {
                let evaluator = evaluator.clone();
                let token = token.clone();
                async move { evaluator.evaluate_pending_sla_events(&token).await }
            },
        ));
    }

    /// Run the dispatcher loop on the current task until shutdown.
    pub async fn send_notifications(&self, interval: Duration) {
        dispatcher_loop(self.dispatcher.clone(), interval, self.shutdown.clone()).await;
    }

    /// Start the dispatcher loop in the background so that `close` waits for it too.
    pub fn spawn_dispatcher(&self, interval: Duration) {
        self.tasks.spawn(dispatcher_loop(
            self.dispatcher.clone(),
            interval,
            self.shutdown.clone(),
        ));
    }

    /// Signal shutdown and wait for all spawned loops to exit.
    pub async fn close(&self) {
        info!("Stopping SLA worker");
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("SLA worker stopped");
    }
}

async fn dispatcher_loop(
    dispatcher: NotificationDispatcher,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let token = shutdown.clone();
    tick_loop("notification_dispatcher", interval, shutdown, move || {
        let dispatcher = dispatcher.clone();
        let token = token.clone();
        async move { dispatcher.send_due_notifications(&token).await }
    })
    .await;
}

/// Run `pass` every `period` until `shutdown` fires. The first pass runs one
/// period after start. A pass in progress is never interrupted by the timer.
async fn tick_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut pass: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = SlaResult<usize>>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(loop_name = name, interval_secs = period.as_secs(), "SLA loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match pass().await {
                    Ok(count) if count > 0 => debug!(loop_name = name, count, "SLA pass finished"),
                    Ok(_) => {}
                    Err(e) => error!(loop_name = name, error = %e, "SLA pass failed"),
                }
            }
        }
    }

    info!(loop_name = name, "SLA loop stopped");
}
