use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

/// Review status of a candidacy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidacyStatus {
    #[field(value = "PENDING")]
    Pending,
    #[field(value = "APPROVED")]
    Approved,
    #[field(value = "REJECTED")]
    Rejected,
}

impl Display for CandidacyStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{name}")
    }
}

impl From<CandidacyStatus> for Bson {
    fn from(status: CandidacyStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// An administrator's verdict on a candidacy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for CandidacyStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => CandidacyStatus::Approved,
            Decision::Rejected => CandidacyStatus::Rejected,
        }
    }
}
