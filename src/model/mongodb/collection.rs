use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    candidacy::Candidacy,
    election::Election,
    invalidation::VoteInvalidation,
    member::Member,
    office::{Office, OfficeCategory},
    vote::Vote,
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

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for OfficeCategory {
    const NAME: &'static str = "office_categories";
}

impl MongoCollection for Office {
    const NAME: &'static str = "offices";
}

impl MongoCollection for Member {
    const NAME: &'static str = "members";
}

impl MongoCollection for Candidacy {
    const NAME: &'static str = "candidacies";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for VoteInvalidation {
    const NAME: &'static str = "vote_invalidations";
}

/// Ensure that all the required indexes exist on the given database.
/// These indexes carry the invariants that must hold under concurrency:
/// one vote per member per office, one active election, one candidacy
/// per member per office, unique display numbers, one invalidation per vote.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Vote collection.
    let vote_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "office_id": 1, "member_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Election collection: only one document may carry `active: true`.
    let active_only = IndexOptions::builder()
        .unique(true)
        .partial_filter_expression(doc! {"active": true})
        .build();
    let election_index = IndexModel::builder()
        .keys(doc! {"active": 1})
        .options(active_only)
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    // Candidacy collection.
    let candidacy_member_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "office_id": 1, "member_id": 1})
        .options(unique.clone())
        .build();
    let candidacy_number_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "office_id": 1, "number": 1})
        .options(unique.clone())
        .build();
    Coll::<Candidacy>::from_db(db)
        .create_indexes([candidacy_member_index, candidacy_number_index], None)
        .await?;

    // Invalidation collection.
    let invalidation_index = IndexModel::builder()
        .keys(doc! {"vote_id": 1})
        .options(unique)
        .build();
    Coll::<VoteInvalidation>::from_db(db)
        .create_index(invalidation_index, None)
        .await?;

    Ok(())
}
