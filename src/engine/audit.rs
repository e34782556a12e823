//! Audit projections, integrity re-verification and administrative invalidation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::engine::{casting::existing_election, record::IntegrityKey, tally::ensure_published};
use crate::error::{Error, Result};
use crate::model::{
    api::audit::{AuditRecord, IntegrityReport, VoteRecord},
    db::{invalidation::VoteInvalidation, vote::Vote},
    mongodb::Id,
};
use crate::store::BallotStore;

/// Votes of an existing election, ordered by office ballot position then
/// cast time, along with the IDs of those that were invalidated.
async fn ordered_votes(store: &dyn BallotStore, election_id: Id) -> Result<(Vec<Vote>, HashSet<Id>)> {
    existing_election(store, election_id).await?;
    let position = store
        .offices(election_id)
        .await?
        .into_iter()
        .enumerate()
        .map(|(index, office)| (office.id, index))
        .collect::<HashMap<_, _>>();
    let mut votes = store.votes(election_id, None).await?;
    votes.sort_by_key(|vote| {
        (
            position.get(&vote.office_id).copied().unwrap_or(usize::MAX),
            vote.cast_at,
            vote.id,
        )
    });
    let invalidated = store
        .invalidations(election_id)
        .await?
        .into_iter()
        .map(|invalidation| invalidation.vote_id)
        .collect();
    Ok((votes, invalidated))
}

/// Public, voter-anonymous view of every vote in an election.
pub async fn audit_trail(store: &dyn BallotStore, election_id: Id) -> Result<Vec<AuditRecord>> {
    let (votes, invalidated) = ordered_votes(store, election_id).await?;
    Ok(votes
        .iter()
        .map(|vote| AuditRecord::new(vote, invalidated.contains(&vote.id)))
        .collect())
}

/// As [`audit_trail`], but only once the election has closed.
/// While voting is under way the trail would reveal the running tally.
pub async fn published_audit_trail(
    store: &dyn BallotStore,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<Vec<AuditRecord>> {
    ensure_published(store, election_id, now).await?;
    audit_trail(store, election_id).await
}

/// Full records of every vote in an election, for administrators.
pub async fn vote_records(store: &dyn BallotStore, election_id: Id) -> Result<Vec<VoteRecord>> {
    let (votes, invalidated) = ordered_votes(store, election_id).await?;
    Ok(votes
        .iter()
        .map(|vote| VoteRecord::new(vote, invalidated.contains(&vote.id)))
        .collect())
}

/// Recompute every stored integrity hash of an election.
pub async fn verify_integrity(
    store: &dyn BallotStore,
    key: &IntegrityKey,
    election_id: Id,
) -> Result<IntegrityReport> {
    existing_election(store, election_id).await?;
    let votes = store.votes(election_id, None).await?;
    let tampered = votes
        .iter()
        .filter(|vote| !key.verify(vote))
        .map(|vote| vote.id.into())
        .collect::<Vec<_>>();
    if tampered.is_empty() {
        info!("All {} vote(s) of election {election_id} verified", votes.len());
    } else {
        warn!(
            "{} of {} vote(s) of election {election_id} failed integrity verification",
            tampered.len(),
            votes.len()
        );
    }
    Ok(IntegrityReport {
        election_id: election_id.into(),
        checked: votes.len() as u64,
        tampered,
    })
}

/// Record that a vote no longer counts for its candidate. The vote itself is untouched.
pub async fn invalidate_vote(
    store: &dyn BallotStore,
    admin_id: Id,
    vote_id: Id,
    reason: String,
    now: DateTime<Utc>,
) -> Result<VoteInvalidation> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::BadRequest("Invalidation reason must not be empty".to_string()));
    }
    let vote = store
        .vote(vote_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote with ID '{vote_id}'")))?;

    let invalidation = VoteInvalidation::new(&vote, reason.to_string(), admin_id, now);
    store.insert_invalidation(invalidation.clone()).await?;
    warn!("Admin {admin_id} invalidated vote {vote_id}: {reason}");
    Ok(invalidation)
}
