use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    ballot::{Ballot, NewBallot},
    candidacy::{Candidacy, NewCandidacy},
    election::{Election, NewElection},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Candidacy collections
const CANDIDACIES: &str = "candidacies";
impl MongoCollection for Candidacy {
    const NAME: &'static str = CANDIDACIES;
}
impl MongoCollection for NewCandidacy {
    const NAME: &'static str = CANDIDACIES;
}

// Ballot collections
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}
impl MongoCollection for NewBallot {
    const NAME: &'static str = BALLOTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// These indexes are what make the uniqueness rules hold under concurrent
/// writers, so the server must not start without them.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // At most one active election per cohort.
    let active_only = IndexOptions::builder()
        .unique(true)
        .partial_filter_expression(doc! {"active": true})
        .build();
    let cohort_index = IndexModel::builder()
        .keys(doc! {"course": 1, "year": 1, "division": 1})
        .options(active_only)
        .build();
    Coll::<Election>::from_db(db)
        .create_index(cohort_index, None)
        .await?;

    // At most one candidacy per voter per election.
    let candidacy_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Candidacy>::from_db(db)
        .create_index(candidacy_index, None)
        .await?;

    // At most one ballot per voter per election.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique)
        .build();
    let tally_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "candidacy_id": 1})
        .build();
    let ballots = Coll::<Ballot>::from_db(db);
    ballots.create_index(ballot_index, None).await?;
    ballots.create_index(tally_index, None).await?;

    Ok(())
}
