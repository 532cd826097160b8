use std::collections::HashMap;

use log::{debug, warn};
use mongodb::{
    bson::{doc, Bson, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
    options::FindOptions,
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::filter::ListFilter,
    common::{CandidacyStatus, Cohort, Phase},
    db::{
        ballot::{Ballot, NewBallot},
        candidacy::{Candidacy, NewCandidacy},
        election::{Election, NewElection},
    },
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::{CandidacyQuery, Guarded, Store};

/// The production store, backed by a MongoDB replica set.
///
/// Uniqueness is enforced by the indexes created in [`ensure_indexes_exist`];
/// deleting an election runs as one multi-document transaction.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the given deployment and make sure the indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn coll<T: crate::model::mongodb::MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// One attempt at inserting a candidacy while its election is in `open`.
    ///
    /// The election document is written in the same transaction, so a phase
    /// change or delete racing with this insert causes a write conflict
    /// instead of going unnoticed.
    async fn try_insert_candidacy(
        &self,
        candidacy: &NewCandidacy,
        open: Phase,
    ) -> Result<Guarded<Candidacy>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! {
            "_id": candidacy.election_id,
            "phase": open,
        };
        let touch = doc! {
            "$inc": {
                "applications": 1,
            }
        };
        let touched = self
            .coll::<Election>()
            .update_one_with_session(filter, touch, None, &mut session)
            .await?;
        if touched.matched_count == 0 {
            session.abort_transaction().await?;
            return Err(Error::NoActiveElection);
        }

        let result = self
            .coll::<NewCandidacy>()
            .insert_one_with_session(candidacy, None, &mut session)
            .await;
        let inserted = match guard(result)? {
            Guarded::Applied(inserted) => inserted,
            // Dropping the session aborts the transaction.
            Guarded::Violated => return Ok(Guarded::Violated),
        };
        session.commit_transaction().await?;

        Ok(Guarded::Applied(Candidacy {
            id: inserted_id(inserted.inserted_id)?,
            candidacy: candidacy.clone(),
        }))
    }
}

/// How many times a transaction that hit a write conflict is attempted.
const TRANSACTION_ATTEMPTS: usize = 3;

/// Sort documents oldest first. Object IDs start with their creation time.
fn oldest_first() -> FindOptions {
    FindOptions::builder().sort(doc! {"_id": 1}).build()
}

/// Turn a driver-reported inserted ID back into ours.
fn inserted_id(id: Bson) -> Result<Id> {
    id.as_object_id()
        .map(Id::from)
        .ok_or_else(|| Error::Internal(format!("Unexpected inserted ID: {id}")))
}

/// Map a duplicate key error onto [`Guarded::Violated`].
fn guard<T>(result: std::result::Result<T, DbError>) -> Result<Guarded<T>> {
    match result {
        Ok(value) => Ok(Guarded::Applied(value)),
        Err(e) if is_duplicate_key_error(&e) => {
            debug!("Write refused by unique index: {e}");
            Ok(Guarded::Violated)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read a `$sum` result, which the server may report at either width.
fn count_field(doc: &Document, key: &str) -> u64 {
    match doc.get(key) {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        _ => 0,
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_election(&self, election: NewElection) -> Result<Guarded<Election>> {
        let result = self
            .coll::<NewElection>()
            .insert_one(&election, None)
            .await;
        match guard(result)? {
            Guarded::Applied(inserted) => Ok(Guarded::Applied(Election {
                id: inserted_id(inserted.inserted_id)?,
                election,
            })),
            Guarded::Violated => Ok(Guarded::Violated),
        }
    }

    async fn replace_election(
        &self,
        election: &Election,
        expected: Phase,
    ) -> Result<Guarded<bool>> {
        let filter = doc! {
            "_id": election.id,
            "phase": expected,
        };
        let result = self
            .coll::<Election>()
            .replace_one(filter, election, None)
            .await;
        Ok(match guard(result)? {
            Guarded::Applied(replaced) => Guarded::Applied(replaced.matched_count == 1),
            Guarded::Violated => Guarded::Violated,
        })
    }

    async fn advance_phase(&self, id: Id, from: Phase, to: Phase) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "phase": from,
        };
        let update = doc! {
            "$set": {
                "phase": to,
                "active": to.is_active(),
            }
        };
        let result = self
            .coll::<Election>()
            .update_one(filter, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn delete_election(&self, id: Id, phases: &[Phase]) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Delete the election itself, provided it is still deletable.
        let filter = doc! {
            "_id": id,
            "phase": { "$in": phases.iter().copied().map(Bson::from).collect::<Vec<_>>() },
        };
        let result = self
            .coll::<Election>()
            .delete_one_with_session(filter, None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }

        // Delete everything that belonged to it.
        let filter = doc! {
            "election_id": id,
        };
        let candidacies = self
            .coll::<Candidacy>()
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        let ballots = self
            .coll::<Ballot>()
            .delete_many_with_session(filter, None, &mut session)
            .await?;
        if ballots.deleted_count > 0 {
            warn!(
                "Deleting election {id} discarded {} ballots",
                ballots.deleted_count
            );
        }

        session.commit_transaction().await?;
        debug!(
            "Deleted election {id} and {} candidacies",
            candidacies.deleted_count
        );
        Ok(true)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self
            .coll::<Election>()
            .find_one(id.as_doc(), None)
            .await?)
    }

    async fn active_election(&self, cohort: &Cohort) -> Result<Option<Election>> {
        let mut filter = cohort.as_doc();
        filter.insert("active", true);
        Ok(self.coll::<Election>().find_one(filter, None).await?)
    }

    async fn elections(&self, filter: &ListFilter) -> Result<Vec<Election>> {
        Ok(self
            .coll::<Election>()
            .find(filter.as_doc("name"), oldest_first())
            .await?
            .try_collect()
            .await?)
    }

    async fn elections_in(&self, phases: &[Phase]) -> Result<Vec<Election>> {
        let filter = doc! {
            "phase": { "$in": phases.iter().copied().map(Bson::from).collect::<Vec<_>>() },
        };
        Ok(self
            .coll::<Election>()
            .find(filter, oldest_first())
            .await?
            .try_collect()
            .await?)
    }

    async fn insert_candidacy(
        &self,
        candidacy: NewCandidacy,
        open: Phase,
    ) -> Result<Guarded<Candidacy>> {
        let mut attempt = 1;
        loop {
            match self.try_insert_candidacy(&candidacy, open).await {
                Err(Error::Db(e))
                    if attempt < TRANSACTION_ATTEMPTS
                        && e.contains_label(TRANSIENT_TRANSACTION_ERROR) =>
                {
                    debug!("Retrying candidacy insert after a write conflict: {e}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn candidacy(&self, id: Id) -> Result<Option<Candidacy>> {
        Ok(self
            .coll::<Candidacy>()
            .find_one(id.as_doc(), None)
            .await?)
    }

    async fn candidacy_of(&self, voter_id: Id, election_id: Id) -> Result<Option<Candidacy>> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.coll::<Candidacy>().find_one(filter, None).await?)
    }

    async fn set_candidacy_status(&self, id: Id, status: CandidacyStatus) -> Result<bool> {
        let update = doc! {
            "$set": {
                "status": status,
            }
        };
        let result = self
            .coll::<Candidacy>()
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn candidacies(&self, query: &CandidacyQuery) -> Result<Vec<Candidacy>> {
        let mut filter = query.filter.as_doc("applicant_name");
        if let Some(election_id) = query.election_id {
            filter.insert("election_id", election_id);
        }
        if let Some(status) = query.status {
            filter.insert("status", status);
        }
        Ok(self
            .coll::<Candidacy>()
            .find(filter, oldest_first())
            .await?
            .try_collect()
            .await?)
    }

    async fn count_candidacies(&self, election_id: Id, status: CandidacyStatus) -> Result<u64> {
        let filter = doc! {
            "election_id": election_id,
            "status": status,
        };
        Ok(self
            .coll::<Candidacy>()
            .count_documents(filter, None)
            .await?)
    }

    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Guarded<Ballot>> {
        let result = self.coll::<NewBallot>().insert_one(&ballot, None).await;
        match guard(result)? {
            Guarded::Applied(inserted) => Ok(Guarded::Applied(Ballot {
                id: inserted_id(inserted.inserted_id)?,
                ballot,
            })),
            Guarded::Violated => Ok(Guarded::Violated),
        }
    }

    async fn ballot_of(&self, voter_id: Id, election_id: Id) -> Result<Option<Ballot>> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.coll::<Ballot>().find_one(filter, None).await?)
    }

    async fn vote_counts(&self, election_id: Id) -> Result<HashMap<Id, u64>> {
        let pipeline = [
            doc! {
                "$match": {
                    "election_id": election_id,
                }
            },
            doc! {
                "$group": {
                    "_id": "$candidacy_id",
                    "votes": { "$sum": 1 },
                }
            },
        ];
        let groups: Vec<Document> = self
            .coll::<Ballot>()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        let mut counts = HashMap::new();
        for group in groups {
            let candidacy_id = group
                .get_object_id("_id")
                .map_err(|e| Error::Internal(format!("Malformed tally group: {e}")))?;
            counts.insert(Id::from(candidacy_id), count_field(&group, "votes"));
        }
        Ok(counts)
    }
}
