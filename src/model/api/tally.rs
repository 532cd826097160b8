use serde::{Deserialize, Serialize};

use crate::model::common::Phase;

/// Votes received by one approved candidacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidacy_id: String,
    pub applicant_name: String,
    pub image_url: Option<String>,
    pub votes: u64,
}

/// Results of an election, live while voting is open and final once closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub election_id: String,
    pub phase: Phase,
    /// True once no further ballots can be cast.
    #[serde(rename = "final")]
    pub is_final: bool,
    pub total_votes: u64,
    pub candidates: Vec<CandidateTally>,
}

#[cfg(test)]
impl Tally {
    /// Votes received by the given candidacy, if it is on the ballot.
    pub fn votes_for(&self, candidacy_id: &str) -> Option<u64> {
        self.candidates
            .iter()
            .find(|c| c.candidacy_id == candidacy_id)
            .map(|c| c.votes)
    }
}
