use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use rocket::tokio::sync::Mutex;

use super::BallotStore;
use crate::error::{ConflictError, Error, Result, StateError};
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

#[derive(Default)]
struct Tables {
    elections: Vec<Election>,
    categories: Vec<OfficeCategory>,
    offices: Vec<Office>,
    members: Vec<Member>,
    candidacies: Vec<Candidacy>,
    votes: Vec<Vote>,
    invalidations: Vec<VoteInvalidation>,
}

/// A store held entirely in memory, for tests and local runs.
///
/// Every operation takes the same lock, so each one is atomic and the
/// uniqueness checks below behave like the MongoDB indexes.
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_election(&self, election: Election) {
        self.tables.lock().await.elections.push(election);
    }

    pub async fn insert_category(&self, category: OfficeCategory) {
        self.tables.lock().await.categories.push(category);
    }

    pub async fn insert_office(&self, office: Office) {
        self.tables.lock().await.offices.push(office);
    }

    pub async fn insert_member(&self, member: Member) {
        self.tables.lock().await.members.push(member);
    }

    pub async fn insert_candidacy(&self, candidacy: Candidacy) {
        self.tables.lock().await.candidacies.push(candidacy);
    }

    pub async fn set_member_active(&self, member_id: Id, active: bool) {
        let mut tables = self.tables.lock().await;
        if let Some(member) = tables.members.iter_mut().find(|m| m.id == member_id) {
            member.active = active;
        }
    }

    /// Replace a stored vote behind the engine's back.
    /// Only useful for exercising tamper detection.
    pub async fn overwrite_vote(&self, vote: Vote) {
        let mut tables = self.tables.lock().await;
        if let Some(stored) = tables.votes.iter_mut().find(|v| v.id == vote.id) {
            *stored = vote;
        }
    }
}

fn not_found(election_id: Id) -> Error {
    Error::not_found(format!("Election with ID '{election_id}'"))
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn election(&self, election_id: Id) -> Result<Option<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables.elections.iter().find(|e| e.id == election_id).cloned())
    }

    async fn office_categories(&self) -> Result<Vec<OfficeCategory>> {
        let mut categories = self.tables.lock().await.categories.clone();
        categories.sort_by_key(|category| category.display_order);
        Ok(categories)
    }

    async fn offices(&self, election_id: Id) -> Result<Vec<Office>> {
        let tables = self.tables.lock().await;
        let mut offices = tables
            .offices
            .iter()
            .filter(|office| office.election_id == election_id)
            .cloned()
            .collect::<Vec<_>>();
        offices.sort_by_key(|office| (office.display_order, office.id));
        Ok(offices)
    }

    async fn candidacies(&self, election_id: Id) -> Result<Vec<Candidacy>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidacies
            .iter()
            .filter(|candidacy| candidacy.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn member(&self, member_id: Id) -> Result<Option<Member>> {
        let tables = self.tables.lock().await;
        Ok(tables.members.iter().find(|m| m.id == member_id).cloned())
    }

    async fn members(&self, member_ids: &[Id]) -> Result<Vec<Member>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .filter(|member| member_ids.contains(&member.id))
            .cloned()
            .collect())
    }

    async fn active_members(&self) -> Result<Vec<Member>> {
        let tables = self.tables.lock().await;
        Ok(tables.members.iter().filter(|m| m.active).cloned().collect())
    }

    async fn insert_votes(&self, votes: Vec<Vote>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let taken = |vote: &Vote| {
            tables.votes.iter().any(|existing| {
                existing.election_id == vote.election_id
                    && existing.office_id == vote.office_id
                    && existing.member_id == vote.member_id
            })
        };
        let mut batch = HashSet::new();
        for vote in &votes {
            let key = (vote.election_id, vote.office_id, vote.member_id);
            if taken(vote) || !batch.insert(key) {
                return Err(ConflictError::AlreadyVoted {
                    election_id: vote.election_id.into(),
                    offices: Vec::new(),
                }
                .into());
            }
        }
        tables.votes.extend(votes);
        Ok(())
    }

    async fn vote(&self, vote_id: Id) -> Result<Option<Vote>> {
        let tables = self.tables.lock().await;
        Ok(tables.votes.iter().find(|v| v.id == vote_id).cloned())
    }

    async fn votes(&self, election_id: Id, office_id: Option<Id>) -> Result<Vec<Vote>> {
        let tables = self.tables.lock().await;
        let mut votes = tables
            .votes
            .iter()
            .filter(|vote| vote.election_id == election_id)
            .filter(|vote| office_id.map_or(true, |office_id| vote.office_id == office_id))
            .cloned()
            .collect::<Vec<_>>();
        votes.sort_by_key(|vote| (vote.office_id, vote.cast_at));
        Ok(votes)
    }

    async fn voted_offices(&self, election_id: Id, member_id: Id) -> Result<HashSet<Id>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .iter()
            .filter(|vote| vote.election_id == election_id && vote.member_id == member_id)
            .map(|vote| vote.office_id)
            .collect())
    }

    async fn invalidations(&self, election_id: Id) -> Result<Vec<VoteInvalidation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invalidations
            .iter()
            .filter(|invalidation| invalidation.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn insert_invalidation(&self, invalidation: VoteInvalidation) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .invalidations
            .iter()
            .any(|existing| existing.vote_id == invalidation.vote_id)
        {
            return Err(ConflictError::AlreadyInvalidated {
                vote_id: invalidation.vote_id.into(),
            }
            .into());
        }
        tables.invalidations.push(invalidation);
        Ok(())
    }

    async fn activate_election(&self, election_id: Id, now: DateTime<Utc>) -> Result<Election> {
        let mut tables = self.tables.lock().await;

        let target = tables
            .elections
            .iter()
            .position(|e| e.id == election_id)
            .ok_or_else(|| not_found(election_id))?;
        if !tables.elections[target].can_activate(now) {
            return Err(StateError::CannotActivate {
                election_id: election_id.into(),
                status: tables.elections[target].status_at(now),
            }
            .into());
        }

        // Same outcome as the partial unique index: a live flag elsewhere blocks activation.
        if tables
            .elections
            .iter()
            .any(|e| e.id != election_id && e.active && !e.holds_stale_slot(now))
        {
            return Err(ConflictError::AnotherElectionOpen.into());
        }
        for election in tables.elections.iter_mut() {
            if election.id != election_id && election.holds_stale_slot(now) {
                info!("Clearing stale active flag on election {}", election.id);
                election.active = false;
            }
        }

        let election = &mut tables.elections[target];
        election.active = true;
        election.activated_at = Some(BsonDateTime::from_chrono(now));
        Ok(election.clone())
    }

    async fn close_election(&self, election_id: Id, now: DateTime<Utc>) -> Result<Election> {
        let mut tables = self.tables.lock().await;
        let election = tables
            .elections
            .iter_mut()
            .find(|e| e.id == election_id)
            .ok_or_else(|| not_found(election_id))?;
        if election.closed_at.is_some() {
            return Err(StateError::AlreadyClosed {
                election_id: election_id.into(),
            }
            .into());
        }
        election.active = false;
        election.closed_at = Some(BsonDateTime::from_chrono(now));
        Ok(election.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::{
        common::{election::ElectionStatus, outcome::VoteOutcome},
        db::vote::{OriginMetadata, VoteCore},
    };

    fn vote(election_id: Id, office_id: Id, member_id: Id) -> Vote {
        Vote {
            id: Id::new(),
            vote: VoteCore {
                election_id,
                office_id,
                member_id,
                outcome: VoteOutcome::Blank,
                integrity_hash: String::new(),
                cast_at: Utc::now(),
                origin: OriginMetadata::default(),
            },
        }
    }

    #[rocket::async_test]
    async fn duplicate_vote_rolls_back_whole_batch() {
        let store = MemoryStore::new();
        let (election, member) = (Id::new(), Id::new());
        let (first, second) = (Id::new(), Id::new());
        store
            .insert_votes(vec![vote(election, first, member)])
            .await
            .unwrap();

        let err = store
            .insert_votes(vec![
                vote(election, second, member),
                vote(election, first, member),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ConflictError::AlreadyVoted { .. })));
        assert_eq!(store.votes(election, None).await.unwrap().len(), 1);
        assert_eq!(
            store.voted_offices(election, member).await.unwrap(),
            HashSet::from([first])
        );
    }

    #[rocket::async_test]
    async fn only_one_live_active_flag() {
        let store = MemoryStore::new();
        let open = Election::open_example();
        let scheduled = Election::scheduled_example();
        store.insert_election(open.clone()).await;
        store.insert_election(scheduled.clone()).await;

        let err = store
            .activate_election(scheduled.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ConflictError::AnotherElectionOpen)));

        // Once the first window has passed its flag no longer blocks.
        let later = open.end_time + Duration::seconds(1);
        let activated = store.activate_election(scheduled.id, later).await.unwrap();
        assert!(activated.active);
        let old = store.election(open.id).await.unwrap().unwrap();
        assert!(!old.active);
        assert_eq!(old.status_at(later), ElectionStatus::Closed);
    }

    #[rocket::async_test]
    async fn close_is_terminal() {
        let store = MemoryStore::new();
        let election = Election::open_example();
        store.insert_election(election.clone()).await;

        let closed = store.close_election(election.id, Utc::now()).await.unwrap();
        assert!(!closed.active);
        assert_eq!(closed.status_at(Utc::now()), ElectionStatus::Closed);
        let err = store
            .close_election(election.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::AlreadyClosed { .. })));
        let err = store
            .activate_election(election.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::CannotActivate { .. })));
    }
}
