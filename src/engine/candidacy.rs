use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    api::filter::ListFilter,
    common::{CandidacyStatus, Decision, Phase},
    db::{
        candidacy::{Candidacy, NewCandidacy},
        election::Election,
    },
    mongodb::Id,
};
use crate::store::{CandidacyQuery, Guarded, Store};
use crate::uploads::{FileStorage, FileUpload};

use super::{Caller, EligibilityResolver};

/// Upload folder for manifestos.
const MANIFESTO_FOLDER: &str = "manifesto";
/// Upload folder for candidate profile images.
const PROFILE_FOLDER: &str = "profile";

/// Applications to stand as a candidate, and their review.
pub struct CandidacyWorkflow<'a> {
    store: &'a dyn Store,
    files: &'a dyn FileStorage,
}

impl<'a> CandidacyWorkflow<'a> {
    pub(super) fn new(store: &'a dyn Store, files: &'a dyn FileStorage) -> Self {
        Self { store, files }
    }

    /// The caller's cohort election, if it is accepting candidatures.
    async fn open_election(&self, caller: &Caller) -> Result<Option<Election>> {
        EligibilityResolver::new(self.store)
            .resolve_in(caller, Phase::CandidatureOpen)
            .await
    }

    /// Apply as a candidate in the caller's cohort election.
    ///
    /// Files are uploaded before anything is written, so a failed upload
    /// leaves no trace. The store re-checks that candidature is still open
    /// atomically with the insert, since the uploads can take a while.
    pub async fn apply(
        &self,
        caller: &Caller,
        manifesto: FileUpload,
        image: Option<FileUpload>,
    ) -> Result<Candidacy> {
        caller.require_voter()?;
        let election = self
            .open_election(caller)
            .await?
            .ok_or(Error::NoActiveElection)?;
        if self.store.candidacy_of(caller.id, election.id).await?.is_some() {
            return Err(Error::DuplicateApplication);
        }

        let manifesto_url = self.files.upload(&manifesto, MANIFESTO_FOLDER).await?;
        let image_url = match image {
            Some(ref image) => Some(self.files.upload(image, PROFILE_FOLDER).await?),
            None => None,
        };

        let candidacy = NewCandidacy::new(&election, caller, manifesto_url, image_url);
        let candidacy = match self
            .store
            .insert_candidacy(candidacy, Phase::CandidatureOpen)
            .await?
        {
            Guarded::Applied(candidacy) => candidacy,
            Guarded::Violated => return Err(Error::DuplicateApplication),
        };
        info!(
            "Voter {} applied as a candidate in election {}",
            caller.id, election.id
        );
        Ok(candidacy)
    }

    /// Approve or reject an application. Deciding twice the same way has no
    /// further effect.
    pub async fn decide(&self, caller: &Caller, id: Id, decision: Decision) -> Result<Candidacy> {
        caller.require_admin()?;
        let mut candidacy = self
            .store
            .candidacy(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidacy {id}")))?;
        let election = self
            .store
            .election(candidacy.election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", candidacy.election_id)))?;
        if election.phase() != Phase::CandidatureOpen {
            return Err(Error::InvalidState(format!(
                "Candidacies can only be reviewed while candidature is open, election {} is {}",
                election.id,
                election.phase()
            )));
        }

        let status = CandidacyStatus::from(decision);
        if !self.store.set_candidacy_status(id, status).await? {
            return Err(Error::not_found(format!("Candidacy {id}")));
        }
        if candidacy.status != status {
            info!("Candidacy {id} is now {status}");
        } else {
            debug!("Candidacy {id} was already {status}");
        }
        candidacy.status = status;
        Ok(candidacy)
    }

    /// Number of approved candidates in the given election.
    pub async fn count_approved(&self, election_id: Id) -> Result<u64> {
        self.store
            .count_candidacies(election_id, CandidacyStatus::Approved)
            .await
    }

    /// As [`count_approved`](Self::count_approved), for the caller's cohort
    /// election that is accepting candidatures.
    pub async fn count_approved_for_voter(&self, caller: &Caller) -> Result<u64> {
        let election = self
            .open_election(caller)
            .await?
            .ok_or(Error::NoActiveElection)?;
        self.count_approved(election.id).await
    }

    /// Candidacies across all elections, optionally limited to one status.
    pub async fn list_by_status(
        &self,
        caller: &Caller,
        status: Option<CandidacyStatus>,
        filter: ListFilter,
    ) -> Result<Vec<Candidacy>> {
        caller.require_admin()?;
        let query = CandidacyQuery {
            election_id: None,
            status,
            filter,
        };
        self.store.candidacies(&query).await
    }

    /// The caller's application in their cohort election that is accepting
    /// candidatures, if they made one.
    pub async fn own_application(&self, caller: &Caller) -> Result<Option<Candidacy>> {
        match self.open_election(caller).await? {
            Some(election) => self.store.candidacy_of(caller.id, election.id).await,
            None => Ok(None),
        }
    }

    /// The candidates that may receive votes in the given election.
    pub async fn approved(&self, election_id: Id) -> Result<Vec<Candidacy>> {
        let query = CandidacyQuery {
            election_id: Some(election_id),
            status: Some(CandidacyStatus::Approved),
            filter: ListFilter::default(),
        };
        self.store.candidacies(&query).await
    }
}
