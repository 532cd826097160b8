use log::{debug, error};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::common::Cohort;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An active election already exists for {0}")]
    Conflict(Cohort),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Not allowed in the current phase: {0}")]
    InvalidState(String),
    #[error("No election is accepting candidatures for your cohort")]
    NoActiveElection,
    #[error("You have already applied in this election")]
    DuplicateApplication,
    #[error("Voting is not open for this election")]
    VotingClosed,
    #[error("The chosen candidate is not on the ballot for this election")]
    InvalidCandidate,
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("You are not eligible to vote in this election")]
    NotEligible,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("File upload failed: {0}")]
    Upload(String),
    #[error("File upload failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, machine-readable identifiers for each failure.
///
/// Clients branch on these rather than parsing messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Conflict,
    NotFound,
    InvalidState,
    NoActiveElection,
    DuplicateApplication,
    VotingClosed,
    InvalidCandidate,
    AlreadyVoted,
    NotEligible,
    InvalidInput,
    Unauthorized,
    Upload,
    Internal,
}

impl Error {
    /// Shorthand for a missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NoActiveElection => ErrorKind::NoActiveElection,
            Self::DuplicateApplication => ErrorKind::DuplicateApplication,
            Self::VotingClosed => ErrorKind::VotingClosed,
            Self::InvalidCandidate => ErrorKind::InvalidCandidate,
            Self::AlreadyVoted => ErrorKind::AlreadyVoted,
            Self::NotEligible => ErrorKind::NotEligible,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Upload(_) | Self::Http(_) => ErrorKind::Upload,
            Self::Db(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> Status {
        match self.kind() {
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::Conflict
            | ErrorKind::InvalidState
            | ErrorKind::NoActiveElection
            | ErrorKind::DuplicateApplication
            | ErrorKind::VotingClosed
            | ErrorKind::AlreadyVoted => Status::Conflict,
            ErrorKind::InvalidCandidate | ErrorKind::InvalidInput => Status::UnprocessableEntity,
            ErrorKind::NotEligible | ErrorKind::Unauthorized => Status::Forbidden,
            ErrorKind::Upload => Status::BadGateway,
            ErrorKind::Internal => Status::InternalServerError,
        }
    }

    /// The message shown to clients. Storage internals are not leaked.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestId::of(req);
        if status.class() == StatusClass::ServerError {
            error!("req{id} failed: {self}");
        } else {
            debug!("req{id} refused: {self}");
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.public_message(),
        };
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
