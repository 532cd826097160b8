use std::collections::{BTreeMap, HashMap};

use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
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

use super::{CandidacyQuery, Guarded, Store};

/// Unique key shared by candidacies and ballots.
type VoterElection = (Id, Id);

#[derive(Default)]
struct Tables {
    elections: BTreeMap<Id, Election>,
    candidacies: BTreeMap<Id, Candidacy>,
    ballots: BTreeMap<Id, Ballot>,
    candidacy_keys: HashMap<VoterElection, Id>,
    ballot_keys: HashMap<VoterElection, Id>,
}

impl Tables {
    /// Would an election with this cohort clash with a different active one?
    fn cohort_taken(&self, cohort: &Cohort, except: Option<Id>) -> bool {
        self.elections
            .values()
            .any(|e| e.is_active() && e.cohort == *cohort && Some(e.id) != except)
    }
}

/// A store held entirely in process memory.
///
/// One lock covers every table, so each check and the write it guards
/// happen atomically.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_election(&self, election: NewElection) -> Result<Guarded<Election>> {
        let mut tables = self.tables.lock().await;
        if election.is_active() && tables.cohort_taken(&election.cohort, None) {
            return Ok(Guarded::Violated);
        }
        let election = Election {
            id: Id::new(),
            election,
        };
        tables.elections.insert(election.id, election.clone());
        Ok(Guarded::Applied(election))
    }

    async fn replace_election(
        &self,
        election: &Election,
        expected: Phase,
    ) -> Result<Guarded<bool>> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get(&election.id) {
            Some(current) if current.phase() == expected => {}
            _ => return Ok(Guarded::Applied(false)),
        }
        if election.is_active() && tables.cohort_taken(&election.cohort, Some(election.id)) {
            return Ok(Guarded::Violated);
        }
        tables.elections.insert(election.id, election.clone());
        Ok(Guarded::Applied(true))
    }

    async fn advance_phase(&self, id: Id, from: Phase, to: Phase) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get_mut(&id) {
            Some(election) if election.phase() == from => {
                election.set_phase(to);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_election(&self, id: Id, phases: &[Phase]) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get(&id) {
            Some(election) if phases.contains(&election.phase()) => {}
            _ => return Ok(false),
        }
        tables.elections.remove(&id);
        tables.candidacies.retain(|_, c| c.election_id != id);
        tables.ballots.retain(|_, b| b.election_id != id);
        tables.candidacy_keys.retain(|(_, election), _| *election != id);
        tables.ballot_keys.retain(|(_, election), _| *election != id);
        Ok(true)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.tables.lock().await.elections.get(&id).cloned())
    }

    async fn active_election(&self, cohort: &Cohort) -> Result<Option<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .find(|e| e.is_active() && e.cohort == *cohort)
            .cloned())
    }

    async fn elections(&self, filter: &ListFilter) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .filter(|e| filter.matches(&e.name, &e.cohort))
            .cloned()
            .collect())
    }

    async fn elections_in(&self, phases: &[Phase]) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .filter(|e| phases.contains(&e.phase()))
            .cloned()
            .collect())
    }

    async fn insert_candidacy(
        &self,
        candidacy: NewCandidacy,
        open: Phase,
    ) -> Result<Guarded<Candidacy>> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get(&candidacy.election_id) {
            Some(election) if election.phase() == open => {}
            _ => return Err(Error::NoActiveElection),
        }
        let key = (candidacy.voter_id, candidacy.election_id);
        if tables.candidacy_keys.contains_key(&key) {
            return Ok(Guarded::Violated);
        }
        let candidacy = Candidacy {
            id: Id::new(),
            candidacy,
        };
        tables.candidacy_keys.insert(key, candidacy.id);
        tables.candidacies.insert(candidacy.id, candidacy.clone());
        Ok(Guarded::Applied(candidacy))
    }

    async fn candidacy(&self, id: Id) -> Result<Option<Candidacy>> {
        Ok(self.tables.lock().await.candidacies.get(&id).cloned())
    }

    async fn candidacy_of(&self, voter_id: Id, election_id: Id) -> Result<Option<Candidacy>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidacy_keys
            .get(&(voter_id, election_id))
            .and_then(|id| tables.candidacies.get(id))
            .cloned())
    }

    async fn set_candidacy_status(&self, id: Id, status: CandidacyStatus) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.candidacies.get_mut(&id) {
            Some(candidacy) => {
                candidacy.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn candidacies(&self, query: &CandidacyQuery) -> Result<Vec<Candidacy>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidacies
            .values()
            .filter(|c| query.election_id.map_or(true, |id| c.election_id == id))
            .filter(|c| query.status.map_or(true, |s| c.status == s))
            .filter(|c| query.filter.matches(&c.applicant_name, &c.cohort))
            .cloned()
            .collect())
    }

    async fn count_candidacies(&self, election_id: Id, status: CandidacyStatus) -> Result<u64> {
        let tables = self.tables.lock().await;
        let count = tables
            .candidacies
            .values()
            .filter(|c| c.election_id == election_id && c.status == status)
            .count();
        Ok(count as u64)
    }

    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Guarded<Ballot>> {
        let mut tables = self.tables.lock().await;
        let key = (ballot.voter_id, ballot.election_id);
        if tables.ballot_keys.contains_key(&key) {
            return Ok(Guarded::Violated);
        }
        let ballot = Ballot {
            id: Id::new(),
            ballot,
        };
        tables.ballot_keys.insert(key, ballot.id);
        tables.ballots.insert(ballot.id, ballot.clone());
        Ok(Guarded::Applied(ballot))
    }

    async fn ballot_of(&self, voter_id: Id, election_id: Id) -> Result<Option<Ballot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballot_keys
            .get(&(voter_id, election_id))
            .and_then(|id| tables.ballots.get(id))
            .cloned())
    }

    async fn vote_counts(&self, election_id: Id) -> Result<HashMap<Id, u64>> {
        let tables = self.tables.lock().await;
        let mut counts = HashMap::new();
        for ballot in tables.ballots.values() {
            if ballot.election_id == election_id {
                *counts.entry(ballot.candidacy_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
