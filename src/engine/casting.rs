//! Turning a submitted ballot into committed votes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::engine::{
    record::{IntegrityKey, VoteBuilder},
    validator::{self, BallotContext},
};
use crate::error::{ConflictError, Error, Result, StateError};
use crate::model::{
    api::ballot::{BallotEntry, VoteReceipt},
    db::{election::Election, member::Member, vote::OriginMetadata},
    mongodb::Id,
};
use crate::store::BallotStore;

/// Validate a ballot and commit one vote per entry, atomically.
///
/// Either every entry is recorded or none is. Concurrent submissions for
/// the same member and office are settled by the store's uniqueness
/// constraint: exactly one commits, the rest fail with a conflict.
pub async fn cast_ballot(
    store: &dyn BallotStore,
    key: &IntegrityKey,
    member_id: Id,
    election_id: Id,
    entries: &[BallotEntry],
    origin: OriginMetadata,
    now: DateTime<Utc>,
) -> Result<Vec<VoteReceipt>> {
    let election = open_election(store, election_id, now).await?;
    let voter = active_member(store, member_id).await?;

    let offices = store.offices(election_id).await?;
    let candidacies = store.candidacies(election_id).await?;
    let candidate_ids = candidacies
        .iter()
        .map(|candidacy| candidacy.member_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let candidates = store.members(&candidate_ids).await?;
    let already_voted = store.voted_offices(election_id, member_id).await?;

    let ballot = validator::validate(
        &BallotContext {
            election: &election,
            voter: &voter,
            offices: &offices,
            candidacies: &candidacies,
            candidates: &candidates,
            already_voted: &already_voted,
        },
        entries,
    )?;

    let repeated = ballot
        .office_ids()
        .filter(|office_id| already_voted.contains(office_id))
        .map(Into::into)
        .collect::<Vec<_>>();
    if !repeated.is_empty() {
        return Err(ConflictError::AlreadyVoted {
            election_id: election_id.into(),
            offices: repeated,
        }
        .into());
    }

    let builder = VoteBuilder::new(key, ballot.election_id(), member_id, now, origin);
    let votes = ballot
        .entries()
        .iter()
        .map(|entry| builder.build(entry.office_id, entry.outcome))
        .collect::<Vec<_>>();
    let receipts = votes.iter().map(VoteReceipt::from).collect::<Vec<_>>();

    store.insert_votes(votes).await?;
    info!(
        "Member {member_id} cast {} vote(s) in election {election_id}",
        ballot.entries().len()
    );
    Ok(receipts)
}

/// Has the member voted on any office of the election?
pub async fn has_voted(store: &dyn BallotStore, election_id: Id, member_id: Id) -> Result<bool> {
    Ok(!voted_offices(store, election_id, member_id).await?.is_empty())
}

/// Has the member voted on this particular office?
pub async fn has_voted_for_office(
    store: &dyn BallotStore,
    election_id: Id,
    office_id: Id,
    member_id: Id,
) -> Result<bool> {
    Ok(voted_offices(store, election_id, member_id)
        .await?
        .contains(&office_id))
}

/// Offices of an existing election the member has voted on.
pub async fn voted_offices(
    store: &dyn BallotStore,
    election_id: Id,
    member_id: Id,
) -> Result<HashSet<Id>> {
    existing_election(store, election_id).await?;
    store.voted_offices(election_id, member_id).await
}

pub(crate) async fn existing_election(store: &dyn BallotStore, election_id: Id) -> Result<Election> {
    store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}

async fn open_election(store: &dyn BallotStore, election_id: Id, now: DateTime<Utc>) -> Result<Election> {
    let election = existing_election(store, election_id).await?;
    if !election.is_open_for_voting(now) {
        return Err(StateError::ElectionNotOpen {
            election_id: election_id.into(),
            status: election.status_at(now),
        }
        .into());
    }
    Ok(election)
}

async fn active_member(store: &dyn BallotStore, member_id: Id) -> Result<Member> {
    let member = store
        .member(member_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Member with ID '{member_id}'")))?;
    if !member.active {
        return Err(StateError::MemberInactive {
            member_id: member_id.into(),
        }
        .into());
    }
    Ok(member)
}
