use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    common::{CandidacyStatus, Phase},
    db::ballot::{Ballot, NewBallot},
    mongodb::Id,
};
use crate::store::{Guarded, Store};

use super::Caller;

/// Records each voter's single ballot per election.
///
/// Exactly-once voting rests entirely on the store's unique
/// `(voter, election)` key: no read is trusted to decide whether a voter
/// has already voted.
pub struct BallotBox<'a> {
    store: &'a dyn Store,
}

impl<'a> BallotBox<'a> {
    pub(super) fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn cast(&self, caller: &Caller, election_id: Id, candidacy_id: Id) -> Result<Ballot> {
        caller.require_voter()?;
        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        if election.phase() != Phase::VotingOpen {
            return Err(Error::VotingClosed);
        }
        if caller.cohort.as_ref() != Some(&election.cohort) {
            return Err(Error::NotEligible);
        }

        match self.store.candidacy(candidacy_id).await? {
            Some(candidacy)
                if candidacy.election_id == election_id
                    && candidacy.status == CandidacyStatus::Approved => {}
            _ => return Err(Error::InvalidCandidate),
        }

        let ballot = NewBallot::new(election_id, caller.id, candidacy_id);
        match self.store.insert_ballot(ballot).await? {
            Guarded::Applied(ballot) => {
                info!("Ballot {} cast in election {election_id}", ballot.id);
                Ok(ballot)
            }
            Guarded::Violated => {
                debug!("Voter {} tried to vote twice in election {election_id}", caller.id);
                Err(Error::AlreadyVoted)
            }
        }
    }

    pub async fn has_voted(&self, caller: &Caller, election_id: Id) -> Result<bool> {
        Ok(self
            .store
            .ballot_of(caller.id, election_id)
            .await?
            .is_some())
    }
}
