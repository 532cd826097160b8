//! The authoritative data store.
//!
//! Every uniqueness rule the engine relies on is enforced here, atomically
//! with the write that could break it. The engine's own pre-checks only exist
//! to give friendlier errors on the common path.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{
    api::filter::ListFilter,
    common::{CandidacyStatus, Cohort, Phase},
    db::{
        ballot::{Ballot, NewBallot},
        candidacy::{Candidacy, NewCandidacy},
        election::{Election, NewElection},
    },
    mongodb::Id,
};

pub mod memory;
pub mod mongo;

/// Outcome of a write protected by a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The write went through.
    Applied(T),
    /// The write would have broken a unique constraint and was not applied.
    Violated,
}

/// Selects candidacies for the administrative views.
#[derive(Debug, Clone, Default)]
pub struct CandidacyQuery {
    pub election_id: Option<Id>,
    pub status: Option<CandidacyStatus>,
    /// Name search applies to the applicant name.
    pub filter: ListFilter,
}

#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert an election, unless another active election holds its cohort.
    async fn insert_election(&self, election: NewElection) -> Result<Guarded<Election>>;

    /// Replace an election wholesale, only if it is still in phase
    /// `expected`. `Applied(false)` if it does not exist or has moved on.
    async fn replace_election(
        &self,
        election: &Election,
        expected: Phase,
    ) -> Result<Guarded<bool>>;

    /// Move an election from one phase to another, only if it is still in
    /// `from`. Returns whether the move happened.
    async fn advance_phase(&self, id: Id, from: Phase, to: Phase) -> Result<bool>;

    /// Delete an election along with its candidacies and ballots, only if it
    /// is in one of the given phases. Returns whether anything was deleted.
    async fn delete_election(&self, id: Id, phases: &[Phase]) -> Result<bool>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;

    /// The election currently occupying the given cohort, if any.
    async fn active_election(&self, cohort: &Cohort) -> Result<Option<Election>>;

    async fn elections(&self, filter: &ListFilter) -> Result<Vec<Election>>;

    /// Every election in one of the given phases.
    async fn elections_in(&self, phases: &[Phase]) -> Result<Vec<Election>>;

    /// Insert a candidacy, unless the voter already applied to that election.
    ///
    /// The election must exist and be in phase `open` when the write lands,
    /// otherwise this fails with [`Error::NoActiveElection`](crate::error::Error::NoActiveElection).
    async fn insert_candidacy(
        &self,
        candidacy: NewCandidacy,
        open: Phase,
    ) -> Result<Guarded<Candidacy>>;

    async fn candidacy(&self, id: Id) -> Result<Option<Candidacy>>;

    /// The given voter's candidacy in the given election.
    async fn candidacy_of(&self, voter_id: Id, election_id: Id) -> Result<Option<Candidacy>>;

    /// Returns whether the candidacy exists.
    async fn set_candidacy_status(&self, id: Id, status: CandidacyStatus) -> Result<bool>;

    async fn candidacies(&self, query: &CandidacyQuery) -> Result<Vec<Candidacy>>;

    async fn count_candidacies(&self, election_id: Id, status: CandidacyStatus) -> Result<u64>;

    /// Insert a ballot, unless the voter already voted in that election.
    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Guarded<Ballot>>;

    async fn ballot_of(&self, voter_id: Id, election_id: Id) -> Result<Option<Ballot>>;

    /// Ballots per candidacy in the given election, read in one go.
    async fn vote_counts(&self, election_id: Id) -> Result<HashMap<Id, u64>>;
}
