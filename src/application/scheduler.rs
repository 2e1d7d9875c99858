use super::reconcile::{self, SweepOutcome};
use crate::domain::fare::{Fare, FareStatus};
use crate::domain::ports::{ClockRef, FareStoreRef, SystemClock};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

/// Shortest period `start` accepts; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Counts of status changes made by one scheduler run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransitionReport {
    pub activated: usize,
    pub deactivated: usize,
    pub failed: usize,
}

impl TransitionReport {
    pub fn is_empty(&self) -> bool {
        self.activated == 0 && self.deactivated == 0 && self.failed == 0
    }

    fn absorb(&mut self, sweep: SweepOutcome) {
        self.deactivated += sweep.deactivated;
        self.failed += sweep.failed;
    }
}

/// Periodic reconciliation of fare statuses against effective dates.
///
/// Each run scans the whole store, so it is idempotent and heals whatever a
/// failed run or a racing creation left behind.
#[derive(Clone)]
pub struct FareTransitionScheduler {
    store: FareStoreRef,
    clock: ClockRef,
}

impl FareTransitionScheduler {
    pub fn new(store: FareStoreRef) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    /// Runs both passes as of `now`.
    ///
    /// Only reading the fare set can fail the run; individual write failures
    /// are logged and counted in the report.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<TransitionReport> {
        let mut report = TransitionReport::default();
        self.activate_due_fares(now, &mut report).await?;
        self.deactivate_superseded_fares(now, &mut report).await?;
        Ok(report)
    }

    /// Runs once against the clock and logs the outcome instead of returning it.
    pub async fn run_logged(&self) {
        tracing::info!("Processing fare transitions");
        match self.run(self.clock.now()).await {
            Ok(report) => tracing::info!(
                activated = report.activated,
                deactivated = report.deactivated,
                failed = report.failed,
                "Fare transition processing completed"
            ),
            Err(e) => tracing::error!(error = %e, "Error processing fare transitions"),
        }
    }

    /// Activation pass.
    ///
    /// Only the rightful fare of an organization (the due fare with the latest
    /// effective date) is activated. Older due fares stay inactive, otherwise
    /// every run would revive the fares the previous run superseded.
    async fn activate_due_fares(
        &self,
        now: DateTime<Utc>,
        report: &mut TransitionReport,
    ) -> Result<()> {
        let rightful = rightful_fares(self.store.find_all().await?, now);
        let pending: Vec<Fare> = self
            .store
            .find_by_status(FareStatus::Inactive)
            .await?
            .into_iter()
            .filter(|fare| fare.is_due(now))
            .filter(|fare| {
                rightful
                    .get(fare.organization_id.as_str())
                    .is_some_and(|winner| winner.id == fare.id)
            })
            .collect();

        // At most one fare per organization, so the sweeps do not overlap.
        let mut activations = JoinSet::new();
        for mut fare in pending {
            let store = Arc::clone(&self.store);
            activations.spawn(async move {
                tracing::info!(
                    fare_code = %fare.code,
                    organization_id = %fare.organization_id,
                    effective_date = ?fare.effective_date,
                    "Activating fare"
                );
                fare.status = FareStatus::Active;
                let saved = store.save(fare).await?;
                reconcile::deactivate_siblings(&store, &saved).await
            });
        }

        while let Some(joined) = activations.join_next().await {
            match joined {
                Ok(Ok(sweep)) => {
                    report.activated += 1;
                    report.absorb(sweep);
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to activate fare");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fare activation task aborted");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Deactivation pass.
    ///
    /// Groups the active due fares by organization and keeps the latest of each
    /// group. Fares without an effective date never enter a group.
    async fn deactivate_superseded_fares(
        &self,
        now: DateTime<Utc>,
        report: &mut TransitionReport,
    ) -> Result<()> {
        let active_due: Vec<Fare> = self
            .store
            .find_by_status(FareStatus::Active)
            .await?
            .into_iter()
            .filter(|fare| fare.is_due(now))
            .collect();

        let mut groups: HashMap<String, Vec<Fare>> = HashMap::new();
        for fare in active_due {
            groups
                .entry(fare.organization_id.clone())
                .or_default()
                .push(fare);
        }

        let mut superseded = Vec::new();
        for (_, mut group) in groups {
            group.sort_by(|a, b| b.recency_cmp(a));
            superseded.extend(group.into_iter().skip(1));
        }

        report.absorb(reconcile::deactivate_fares(&self.store, superseded).await);
        Ok(())
    }

    /// Starts running on a fixed period until the returned handle is stopped.
    /// A zero period is raised to one second.
    ///
    /// Every tick spawns an independent run, so a run stuck on the store does
    /// not hold back later ticks. The first run happens immediately when
    /// `run_immediately` is set, otherwise after one period.
    pub fn start(&self, period: Duration, run_immediately: bool) -> SchedulerHandle {
        let period = if period.is_zero() {
            tracing::warn!(
                min_period_millis = MIN_PERIOD.as_millis() as u64,
                "Zero scheduler period requested, using the minimum"
            );
            MIN_PERIOD
        } else {
            period
        };
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            if !run_immediately {
                ticker.reset();
            }

            let mut runs = JoinSet::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let run = scheduler.clone();
                        runs.spawn(async move { run.run_logged().await });
                    }
                    Some(finished) = runs.join_next(), if !runs.is_empty() => {
                        if let Err(e) = finished {
                            tracing::error!(error = %e, "Fare transition run panicked");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            runs.abort_all();
            while runs.join_next().await.is_some() {}
            tracing::info!("Fare transition scheduler stopped");
        });

        tracing::info!(period_secs = period.as_secs(), "Fare transition scheduler started");
        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner of a running scheduler; stopping it aborts runs still in flight.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Fare transition scheduler task failed");
        }
    }
}

/// The due fare with the latest effective date, per organization.
fn rightful_fares(fares: Vec<Fare>, now: DateTime<Utc>) -> HashMap<String, Fare> {
    let mut rightful: HashMap<String, Fare> = HashMap::new();
    for fare in fares.into_iter().filter(|fare| fare.is_due(now)) {
        match rightful.get(&fare.organization_id) {
            Some(current) if current.recency_cmp(&fare).is_ge() => {}
            _ => {
                rightful.insert(fare.organization_id.clone(), fare);
            }
        }
    }
    rightful
}
