use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, error, info, trace, warn};
use rocket::{
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
};

use crate::error::Result;
use crate::model::{common::Phase, db::election::Election, mongodb::Id};
use crate::scheduled_task::ScheduledTask;
use crate::store::Store;

/// Map from election IDs to their next scheduled phase change.
type TaskMap = HashMap<Id, ScheduledTask<()>>;

/// Moves elections through their phases when their dates arrive.
///
/// Each election has at most one pending change: into `VOTING_OPEN` at its
/// voting start date, or into `CLOSED` at its voting end date. Changes are
/// compare-and-set, so an administrator who got there first always wins.
#[derive(Clone)]
pub struct PhaseScheduler {
    store: Arc<dyn Store>,
    tasks: Arc<Mutex<TaskMap>>,
    retry_interval: Duration,
}

impl PhaseScheduler {
    pub fn new(store: Arc<dyn Store>, retry_interval: Duration) -> Self {
        Self {
            store,
            tasks: Default::default(),
            retry_interval,
        }
    }

    /// Number of elections with a phase change scheduled.
    pub async fn pending(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Schedule the next phase change of every running election.
    pub async fn schedule_all(&self) -> Result<()> {
        let running = self
            .store
            .elections_in(&[Phase::CandidatureOpen, Phase::VotingOpen])
            .await?;
        let count = running.len();
        for election in running {
            self.schedule(&election).await;
        }
        debug!("Scheduled phase changes for {count} elections");
        Ok(())
    }

    /// Schedule the next phase change for the given election, replacing any
    /// existing one. Elections that are pending or closed have none.
    pub async fn schedule(&self, election: &Election) {
        let next = match election.phase() {
            Phase::CandidatureOpen => Some((
                Phase::CandidatureOpen,
                Phase::VotingOpen,
                election.voting_start_date,
            )),
            Phase::VotingOpen => Some((Phase::VotingOpen, Phase::Closed, election.voting_end_date)),
            Phase::Pending | Phase::Closed => None,
        };

        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&election.id) {
            trace!(
                "Dropping phase change for election {} due at {}",
                election.id,
                task.run_at()
            );
            if task.cancel().await {
                trace!("Replaced phase change for election {} had already run", election.id);
            }
        }
        if let Some((from, to, at)) = next {
            let task = ScheduledTask::new(self.transition(election.id, from, to), at);
            tasks_locked.insert(election.id, task);
            debug!("Election {} will move from {from} to {to} at {at}", election.id);
        }
    }

    /// Forget any phase change scheduled for the given election.
    pub async fn unschedule(&self, election_id: Id) {
        let task = self.tasks.lock().await.remove(&election_id);
        if let Some(task) = task {
            task.cancel().await;
        }
    }

    /// Perform one phase change, then schedule the next.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn transition(&self, election_id: Id, from: Phase, to: Phase) -> BoxFuture<'static, ()> {
        let scheduler = self.clone();
        async move {
            // Drop (rather than cancel) our own entry: we are that task.
            scheduler.tasks.lock().await.remove(&election_id);

            match scheduler.store.advance_phase(election_id, from, to).await {
                Ok(false) => {
                    debug!("Election {election_id} was no longer {from}, nothing to do");
                }
                Ok(true) => {
                    info!("Election {election_id} moved from {from} to {to} on schedule");
                    if to == Phase::Closed {
                        return;
                    }
                    match scheduler.store.election(election_id).await {
                        Ok(Some(election)) => scheduler.schedule(&election).await,
                        Ok(None) => debug!("Election {election_id} disappeared after {to}"),
                        Err(e) => {
                            error!("Failed to load election {election_id} after moving to {to}: {e}")
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to move election {election_id} from {from} to {to}: {e}");
                    let retry = scheduler.transition(election_id, from, to);
                    let retry_time = Utc::now() + scheduler.retry_interval;
                    scheduler
                        .tasks
                        .lock()
                        .await
                        .insert(election_id, ScheduledTask::new(retry, retry_time));
                    warn!(
                        "Phase change will be retried in {} seconds",
                        scheduler.retry_interval.num_seconds()
                    );
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
impl PhaseScheduler {
    /// Does the given election have a phase change scheduled?
    pub async fn has_pending(&self, election_id: Id) -> bool {
        self.tasks.lock().await.contains_key(&election_id)
    }

    /// When the given election's next phase change is due, if one is scheduled.
    pub async fn next_change(&self, election_id: Id) -> Option<chrono::DateTime<Utc>> {
        self.tasks
            .lock()
            .await
            .get(&election_id)
            .map(ScheduledTask::run_at)
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio::time::{sleep, Duration as StdDuration};

    use super::super::fixtures::*;
    use super::*;

    use crate::model::api::election::{ElectionSpec, ElectionUpdate};

    /// Poll until the election reaches `phase`, for at most a few seconds.
    async fn wait_for(engine: &super::super::Engine, id: Id, phase: Phase) -> bool {
        for _ in 0..100 {
            let election = engine.elections().get(&admin(), id).await.unwrap();
            if election.election.phase == phase {
                return true;
            }
            sleep(StdDuration::from_millis(50)).await;
        }
        false
    }

    #[rocket::async_test]
    async fn overdue_elections_run_to_completion() {
        let (engine, _) = engine();
        let admin = admin();
        let spec = ElectionSpec::past_example(bca2a());
        let election = engine
            .elections()
            .create(&admin, spec.clone())
            .await
            .unwrap();
        assert!(!engine.scheduler().has_pending(election.id).await);

        let update = ElectionUpdate {
            spec,
            phase: Phase::CandidatureOpen,
        };
        engine
            .elections()
            .update(&admin, election.id, update)
            .await
            .unwrap();

        assert!(wait_for(&engine, election.id, Phase::Closed).await);
        assert!(!engine.scheduler().has_pending(election.id).await);
    }

    #[rocket::async_test]
    async fn future_dates_wait() {
        let (engine, _) = engine();
        let election = election_in(&engine, bca2a(), Phase::CandidatureOpen).await;
        assert_eq!(
            engine.scheduler().next_change(election.id).await,
            Some(election.voting_start_date)
        );

        let election = engine
            .elections()
            .update(
                &admin(),
                election.id,
                ElectionUpdate {
                    spec: ElectionSpec::example(bca2a()),
                    phase: Phase::VotingOpen,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            engine.scheduler().next_change(election.id).await,
            Some(election.voting_end_date)
        );

        engine
            .elections()
            .update(
                &admin(),
                election.id,
                ElectionUpdate {
                    spec: ElectionSpec::example(bca2a()),
                    phase: Phase::Closed,
                },
            )
            .await
            .unwrap();
        assert!(!engine.scheduler().has_pending(election.id).await);
    }

    #[rocket::async_test]
    async fn delete_unschedules() {
        let (engine, _) = engine();
        let election = election_in(&engine, bca2a(), Phase::CandidatureOpen).await;
        assert!(engine.scheduler().has_pending(election.id).await);
        engine.elections().delete(&admin(), election.id).await.unwrap();
        assert!(!engine.scheduler().has_pending(election.id).await);
    }

    #[rocket::async_test]
    async fn schedule_all_picks_up_running_elections() {
        let (engine, _) = engine();
        let running = election_in(&engine, bca2a(), Phase::VotingOpen).await;
        let cohort = crate::model::common::Cohort::new("BCA", 1, "A");
        let pending = election_in(&engine, cohort, Phase::Pending).await;

        let fresh = PhaseScheduler::new(engine.scheduler().store.clone(), Duration::seconds(1));
        fresh.schedule_all().await.unwrap();
        assert!(fresh.has_pending(running.id).await);
        assert!(!fresh.has_pending(pending.id).await);
        assert_eq!(fresh.pending().await, 1);
    }
}
