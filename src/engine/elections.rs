use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        election::{ElectionDescription, ElectionDetails, ElectionSpec, ElectionUpdate},
        filter::ListFilter,
    },
    common::{Cohort, Phase},
    db::election::{Election, NewElection},
    mongodb::Id,
};
use crate::store::{CandidacyQuery, Guarded, Store};

use super::{Caller, PhaseScheduler};

/// Owns each election's phase and the one-active-election-per-cohort rule.
pub struct ElectionStateMachine<'a> {
    store: &'a dyn Store,
    scheduler: &'a PhaseScheduler,
}

impl<'a> ElectionStateMachine<'a> {
    pub(super) fn new(store: &'a dyn Store, scheduler: &'a PhaseScheduler) -> Self {
        Self { store, scheduler }
    }

    async fn find(&self, id: Id) -> Result<Election> {
        self.store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    /// Fail fast if a different active election already holds the cohort.
    /// The store re-checks this atomically with the write.
    async fn check_cohort_free(&self, cohort: &Cohort, except: Option<Id>) -> Result<()> {
        match self.store.active_election(cohort).await? {
            Some(existing) if Some(existing.id) != except => Err(Error::Conflict(cohort.clone())),
            _ => Ok(()),
        }
    }

    /// Create a new election in the `PENDING` phase.
    pub async fn create(&self, caller: &Caller, spec: ElectionSpec) -> Result<Election> {
        caller.require_admin()?;
        spec.validate()?;
        self.check_cohort_free(&spec.cohort, None).await?;

        let cohort = spec.cohort.clone();
        let election = match self.store.insert_election(NewElection::new(spec)).await? {
            Guarded::Applied(election) => election,
            Guarded::Violated => return Err(Error::Conflict(cohort)),
        };
        info!("Created election {} for {}", election.id, election.cohort);

        self.scheduler.schedule(&election).await;
        Ok(election)
    }

    /// Replace every field of an election, including its phase.
    pub async fn update(&self, caller: &Caller, id: Id, update: ElectionUpdate) -> Result<Election> {
        caller.require_admin()?;
        update.spec.validate()?;
        let mut election = self.find(id).await?;

        let (from, to) = (election.phase(), update.phase);
        if !from.can_move_to(to) {
            return Err(Error::InvalidState(format!(
                "Election {id} cannot move back from {from} to {to}"
            )));
        }
        if to.is_active() {
            self.check_cohort_free(&update.spec.cohort, Some(id)).await?;
        }

        let cohort = update.spec.cohort.clone();
        election.apply(update.spec, to);
        match self.store.replace_election(&election, from).await? {
            Guarded::Applied(true) => {}
            Guarded::Applied(false) => {
                // Deleted, or moved on by the scheduler or another administrator.
                return match self.store.election(id).await? {
                    Some(current) => Err(Error::InvalidState(format!(
                        "Election {id} moved from {from} to {} during the update",
                        current.phase()
                    ))),
                    None => Err(Error::not_found(format!("Election {id}"))),
                };
            }
            Guarded::Violated => return Err(Error::Conflict(cohort)),
        }
        if from != to {
            info!("Election {id} moved from {from} to {to}");
        } else {
            debug!("Election {id} updated");
        }

        self.scheduler.schedule(&election).await;
        Ok(election)
    }

    /// Delete an election that has not yet opened for voting, together with
    /// its candidacies.
    pub async fn delete(&self, caller: &Caller, id: Id) -> Result<()> {
        caller.require_admin()?;
        let election = self.find(id).await?;
        if !election.phase().is_deletable() {
            return Err(Error::InvalidState(format!(
                "Election {id} is {} and can no longer be deleted",
                election.phase()
            )));
        }

        if !self.store.delete_election(id, &Phase::DELETABLE).await? {
            // Lost a race with a phase change or another delete.
            return match self.store.election(id).await? {
                Some(election) => Err(Error::InvalidState(format!(
                    "Election {id} is {} and can no longer be deleted",
                    election.phase()
                ))),
                None => Err(Error::not_found(format!("Election {id}"))),
            };
        }
        info!("Deleted election {id}");

        self.scheduler.unschedule(id).await;
        Ok(())
    }

    /// The election currently occupying the cohort, if any.
    pub async fn active_for_cohort(&self, cohort: &Cohort) -> Result<Option<Election>> {
        self.store.active_election(cohort).await
    }

    pub async fn list(&self, caller: &Caller, filter: &ListFilter) -> Result<Vec<Election>> {
        caller.require_admin()?;
        self.store.elections(filter).await
    }

    /// An election together with every application made to it.
    pub async fn get(&self, caller: &Caller, id: Id) -> Result<ElectionDetails> {
        caller.require_admin()?;
        let election = self.find(id).await?;
        let query = CandidacyQuery {
            election_id: Some(id),
            ..Default::default()
        };
        let candidacies = self.store.candidacies(&query).await?;
        Ok(ElectionDetails {
            election: ElectionDescription::from(election),
            candidacies: candidacies.into_iter().map(Into::into).collect(),
        })
    }

    /// Move an election from `from` to `to`, unless something else moved it
    /// first. Returns whether this call made the change.
    pub async fn advance(&self, id: Id, from: Phase, to: Phase) -> Result<bool> {
        if from == to || !from.can_move_to(to) {
            return Err(Error::InvalidState(format!(
                "Cannot advance an election from {from} to {to}"
            )));
        }
        let moved = self.store.advance_phase(id, from, to).await?;
        if moved {
            info!("Election {id} moved from {from} to {to}");
        } else {
            debug!("Election {id} was no longer {from}, left as is");
        }
        Ok(moved)
    }
}
