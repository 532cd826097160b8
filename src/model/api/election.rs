use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{Cohort, Phase},
    db::election::Election,
};

use super::candidacy::CandidacyDescription;

/// A new election, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    #[serde(flatten)]
    pub cohort: Cohort,
    pub candidature_deadline: DateTime<Utc>,
    pub voting_start_date: DateTime<Utc>,
    pub voting_end_date: DateTime<Utc>,
}

impl ElectionSpec {
    /// Check field constraints and date ordering.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < 2 {
            return Err(Error::InvalidInput(
                "Election name must be at least 2 characters".to_string(),
            ));
        }
        self.cohort.validate()?;
        if self.candidature_deadline > self.voting_start_date
            || self.voting_start_date > self.voting_end_date
        {
            return Err(Error::InvalidInput(
                "Dates must be ordered: candidature deadline, voting start, voting end".to_string(),
            ));
        }
        Ok(())
    }
}

/// A full replacement of an election, including its phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionUpdate {
    #[serde(flatten)]
    pub spec: ElectionSpec,
    pub phase: Phase,
}

/// API-friendly view of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub cohort: Cohort,
    pub phase: Phase,
    pub candidature_deadline: DateTime<Utc>,
    pub voting_start_date: DateTime<Utc>,
    pub voting_end_date: DateTime<Utc>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.to_string(),
            phase: election.phase(),
            name: election.election.name,
            cohort: election.election.cohort,
            candidature_deadline: election.election.candidature_deadline,
            voting_start_date: election.election.voting_start_date,
            voting_end_date: election.election.voting_end_date,
        }
    }
}

/// An election together with every application made to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetails {
    #[serde(flatten)]
    pub election: ElectionDescription,
    pub candidacies: Vec<CandidacyDescription>,
}

/// What a voter sees of their cohort's current election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveElection {
    #[serde(flatten)]
    pub election: ElectionDescription,
    /// Only approved candidacies appear on the ballot.
    pub candidates: Vec<CandidacyDescription>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::{Duration, TimeZone};

    use super::*;

    /// Now, truncated to whole seconds so it survives a database round trip.
    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap()
    }

    impl ElectionSpec {
        /// An election whose dates all lie safely in the future.
        pub fn example(cohort: Cohort) -> Self {
            let now = now();
            Self {
                name: "Class Representative".to_string(),
                cohort,
                candidature_deadline: now + Duration::days(1),
                voting_start_date: now + Duration::days(2),
                voting_end_date: now + Duration::days(3),
            }
        }

        /// An election whose dates have all passed.
        pub fn past_example(cohort: Cohort) -> Self {
            let now = now();
            Self {
                name: "Past Representative".to_string(),
                cohort,
                candidature_deadline: now - Duration::days(3),
                voting_start_date: now - Duration::days(2),
                voting_end_date: now - Duration::days(1),
            }
        }
    }
}
