use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{CandidacyStatus, Cohort, Decision},
    db::candidacy::Candidacy,
};
use crate::uploads::FileUpload;

/// A base64-encoded file, as sent by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFile {
    /// Base64 file content.
    pub file: String,
    pub file_name: String,
    pub file_type: String,
}

impl TryFrom<EncodedFile> for FileUpload {
    type Error = Error;

    fn try_from(encoded: EncodedFile) -> Result<Self, Self::Error> {
        if encoded.file_name.trim().is_empty() || encoded.file_type.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Uploaded files need a name and a type".to_string(),
            ));
        }
        let bytes = BASE64.decode(encoded.file.as_bytes()).map_err(|e| {
            Error::InvalidInput(format!("File '{}' is not valid base64: {e}", encoded.file_name))
        })?;
        Ok(FileUpload {
            bytes,
            file_name: encoded.file_name,
            mime_type: encoded.file_type,
        })
    }
}

/// A voter's application to stand as a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    pub manifesto: EncodedFile,
    pub image: Option<EncodedFile>,
}

/// An administrator's verdict on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

/// API-friendly view of a candidacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidacyDescription {
    pub id: String,
    pub election_id: String,
    pub applicant_name: String,
    #[serde(flatten)]
    pub cohort: Cohort,
    pub status: CandidacyStatus,
    pub manifesto_url: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Candidacy> for CandidacyDescription {
    fn from(candidacy: Candidacy) -> Self {
        Self {
            id: candidacy.id.to_string(),
            election_id: candidacy.election_id.to_string(),
            applicant_name: candidacy.candidacy.applicant_name,
            cohort: candidacy.candidacy.cohort,
            status: candidacy.candidacy.status,
            manifesto_url: candidacy.candidacy.manifesto_url,
            image_url: candidacy.candidacy.image_url,
            created_at: candidacy.candidacy.created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl EncodedFile {
        pub fn example(name: &str) -> Self {
            Self {
                file: BASE64.encode(b"%PDF-1.4 my manifesto"),
                file_name: name.to_string(),
                file_type: "application/pdf".to_string(),
            }
        }
    }

    impl ApplicationSpec {
        pub fn example() -> Self {
            Self {
                manifesto: EncodedFile::example("manifesto.pdf"),
                image: None,
            }
        }
    }
}
