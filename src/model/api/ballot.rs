use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::ballot::Ballot;

/// A voter's choice, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// Hex ID of the chosen candidacy.
    pub candidacy_id: String,
}

/// Confirmation returned to the voter. The voter's identity is deliberately
/// left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub id: String,
    pub election_id: String,
    pub candidacy_id: String,
    pub cast_at: DateTime<Utc>,
}

impl From<Ballot> for BallotReceipt {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id.to_string(),
            election_id: ballot.election_id.to_string(),
            candidacy_id: ballot.candidacy_id.to_string(),
            cast_at: ballot.cast_at,
        }
    }
}
