//! Persistence behind a single trait.
//!
//! Every invariant that must survive concurrent requests (one vote per
//! member per office, one active election, one invalidation per vote) is
//! enforced here by storage constraints, never by checks in the engine.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    db::{
        candidacy::Candidacy,
        election::Election,
        invalidation::VoteInvalidation,
        member::Member,
        office::{Office, OfficeCategory},
        vote::Vote,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A shared handle on whichever store is in use. Placed in Rocket's managed state.
pub type Store = Arc<dyn BallotStore>;

#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    async fn election(&self, election_id: Id) -> Result<Option<Election>>;

    async fn office_categories(&self) -> Result<Vec<OfficeCategory>>;

    /// Offices of the election, in display order.
    async fn offices(&self, election_id: Id) -> Result<Vec<Office>>;

    async fn candidacies(&self, election_id: Id) -> Result<Vec<Candidacy>>;

    async fn member(&self, member_id: Id) -> Result<Option<Member>>;

    /// The members with the given IDs. Unknown IDs are skipped.
    async fn members(&self, member_ids: &[Id]) -> Result<Vec<Member>>;

    async fn active_members(&self) -> Result<Vec<Member>>;

    /// Insert every vote of a ballot, or none of them.
    /// A vote that already exists for the same member and office fails the
    /// whole insert with [`ConflictError::AlreadyVoted`](crate::error::ConflictError::AlreadyVoted).
    async fn insert_votes(&self, votes: Vec<Vote>) -> Result<()>;

    async fn vote(&self, vote_id: Id) -> Result<Option<Vote>>;

    /// Votes of the election, optionally restricted to one office.
    async fn votes(&self, election_id: Id, office_id: Option<Id>) -> Result<Vec<Vote>>;

    /// Offices of the election the member already has a vote for.
    async fn voted_offices(&self, election_id: Id, member_id: Id) -> Result<HashSet<Id>>;

    async fn invalidations(&self, election_id: Id) -> Result<Vec<VoteInvalidation>>;

    /// Record an invalidation. A second one for the same vote fails with
    /// [`ConflictError::AlreadyInvalidated`](crate::error::ConflictError::AlreadyInvalidated).
    async fn insert_invalidation(&self, invalidation: VoteInvalidation) -> Result<()>;

    /// Flag the election active, first clearing the flag on any other
    /// election whose window ended before `now`. Fails with
    /// [`ConflictError::AnotherElectionOpen`](crate::error::ConflictError::AnotherElectionOpen)
    /// if a different election still holds the flag.
    async fn activate_election(&self, election_id: Id, now: DateTime<Utc>) -> Result<Election>;

    /// Set `closed_at` and clear the active flag.
    async fn close_election(&self, election_id: Id, now: DateTime<Utc>) -> Result<Election>;
}
