use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::election::ElectionSpec,
    common::{Cohort, Phase},
    mongodb::Id,
};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// The cohort this election is scoped to.
    #[serde(flatten)]
    pub cohort: Cohort,
    /// Lifecycle phase.
    phase: Phase,
    /// Mirrors `phase.is_active()`; the partial unique index on the cohort
    /// fields only covers documents where this is set.
    active: bool,
    /// Last moment applications are expected.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub candidature_deadline: DateTime<Utc>,
    /// When voting opens.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voting_start_date: DateTime<Utc>,
    /// When voting closes.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voting_end_date: DateTime<Utc>,
}

impl ElectionCore {
    /// Create a new election in the `PENDING` phase.
    pub fn new(spec: ElectionSpec) -> Self {
        Self {
            name: spec.name,
            cohort: spec.cohort,
            phase: Phase::Pending,
            active: true,
            candidature_deadline: spec.candidature_deadline,
            voting_start_date: spec.voting_start_date,
            voting_end_date: spec.voting_end_date,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Move to the given phase, keeping the index flag in step.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.active = phase.is_active();
    }

    /// Replace every administrator-editable field.
    pub fn apply(&mut self, spec: ElectionSpec, phase: Phase) {
        self.name = spec.name;
        self.cohort = spec.cohort;
        self.candidature_deadline = spec.candidature_deadline;
        self.voting_start_date = spec.voting_start_date;
        self.voting_end_date = spec.voting_end_date;
        self.set_phase(phase);
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
