use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Phases in the election lifecycle, in the order they are passed through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Created, not yet accepting anything.
    Pending,
    /// Voters of the cohort may apply as candidates.
    CandidatureOpen,
    /// Voters of the cohort may cast their single ballot.
    VotingOpen,
    /// Finished; results are final.
    Closed,
}

impl Phase {
    /// Phases in which an election still occupies its cohort.
    pub const ACTIVE: [Phase; 3] = [Phase::Pending, Phase::CandidatureOpen, Phase::VotingOpen];

    /// Phases in which an election may still be deleted.
    pub const DELETABLE: [Phase; 2] = [Phase::Pending, Phase::CandidatureOpen];

    /// Is this a non-terminal phase?
    pub fn is_active(self) -> bool {
        self != Phase::Closed
    }

    /// Can an election in this phase be deleted without losing ballots?
    pub fn is_deletable(self) -> bool {
        Self::DELETABLE.contains(&self)
    }

    /// Transitions only ever move forwards, though phases may be skipped.
    pub fn can_move_to(self, next: Phase) -> bool {
        next >= self
    }

    /// Is this phase far enough along for results to exist?
    pub fn has_results(self) -> bool {
        self >= Phase::VotingOpen
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::CandidatureOpen => "CANDIDATURE_OPEN",
            Self::VotingOpen => "VOTING_OPEN",
            Self::Closed => "CLOSED",
        };
        write!(f, "{name}")
    }
}

impl From<Phase> for Bson {
    fn from(phase: Phase) -> Self {
        to_bson(&phase).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_only() {
        assert!(Phase::Pending.can_move_to(Phase::CandidatureOpen));
        assert!(Phase::Pending.can_move_to(Phase::VotingOpen));
        assert!(Phase::VotingOpen.can_move_to(Phase::VotingOpen));
        assert!(!Phase::VotingOpen.can_move_to(Phase::CandidatureOpen));
        assert!(!Phase::Closed.can_move_to(Phase::Pending));
    }

    #[test]
    fn active_and_deletable() {
        for phase in Phase::ACTIVE {
            assert!(phase.is_active());
        }
        assert!(!Phase::Closed.is_active());
        assert!(Phase::CandidatureOpen.is_deletable());
        assert!(!Phase::VotingOpen.is_deletable());
        assert!(!Phase::Closed.is_deletable());
    }

    #[test]
    fn bson_matches_display() {
        for phase in [Phase::Pending, Phase::CandidatureOpen, Phase::VotingOpen, Phase::Closed] {
            assert_eq!(Bson::from(phase), Bson::String(phase.to_string()));
        }
    }
}
