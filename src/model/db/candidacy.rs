use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::engine::Caller;
use crate::model::{
    common::{CandidacyStatus, Cohort},
    mongodb::Id,
};

use super::election::Election;

/// Core candidacy data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CandidacyCore {
    /// The election applied to.
    pub election_id: Id,
    /// The applicant's identity.
    pub voter_id: Id,
    /// The applicant's display name at the time of applying.
    pub applicant_name: String,
    /// The applicant's cohort at the time of applying.
    #[serde(flatten)]
    pub cohort: Cohort,
    pub status: CandidacyStatus,
    /// Where the uploaded manifesto lives.
    pub manifesto_url: String,
    /// Optional replacement profile image.
    pub image_url: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CandidacyCore {
    /// A fresh application awaiting review.
    pub fn new(
        election: &Election,
        applicant: &Caller,
        manifesto_url: String,
        image_url: Option<String>,
    ) -> Self {
        Self {
            election_id: election.id,
            voter_id: applicant.id,
            applicant_name: applicant.name.clone(),
            cohort: election.cohort.clone(),
            status: CandidacyStatus::Pending,
            manifesto_url,
            image_url,
            created_at: Utc::now(),
        }
    }
}

/// A candidacy without an ID.
pub type NewCandidacy = CandidacyCore;

/// A candidacy from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidacy {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidacy: CandidacyCore,
}

impl Deref for Candidacy {
    type Target = CandidacyCore;

    fn deref(&self) -> &Self::Target {
        &self.candidacy
    }
}

impl DerefMut for Candidacy {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidacy
    }
}
