//! On-demand counting. Nothing here is ever persisted.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::engine::casting::existing_election;
use crate::error::{Error, Result, StateError};
use crate::model::{
    api::tally::{CandidateCount, ElectionTally, OfficeTally},
    common::{election::ElectionStatus, outcome::VoteOutcome},
    db::{candidacy::Candidacy, member::Member, office::Office, vote::Vote},
    mongodb::Id,
};
use crate::store::BallotStore;

/// Count the votes of an election, or of a single office in it.
pub async fn get_tally(
    store: &dyn BallotStore,
    election_id: Id,
    office_id: Option<Id>,
    now: DateTime<Utc>,
) -> Result<ElectionTally> {
    let election = existing_election(store, election_id).await?;
    let mut offices = store.offices(election_id).await?;
    if let Some(office_id) = office_id {
        offices.retain(|office| office.id == office_id);
        if offices.is_empty() {
            return Err(Error::not_found(format!(
                "Office with ID '{office_id}' in election '{election_id}'"
            )));
        }
    }

    let candidacies = store.candidacies(election_id).await?;
    let votes = store.votes(election_id, office_id).await?;
    let invalidated = store
        .invalidations(election_id)
        .await?
        .into_iter()
        .map(|invalidation| invalidation.vote_id)
        .collect::<HashSet<_>>();
    let members = store.active_members().await?;

    let offices = offices
        .iter()
        .map(|office| tally_office(office, &candidacies, &votes, &invalidated, &members))
        .collect();
    debug!("Computed tally for election {election_id}");

    Ok(ElectionTally {
        election_id: election_id.into(),
        status: election.status_at(now),
        offices,
    })
}

/// As [`get_tally`], but only once the election has closed.
pub async fn get_published_tally(
    store: &dyn BallotStore,
    election_id: Id,
    office_id: Option<Id>,
    now: DateTime<Utc>,
) -> Result<ElectionTally> {
    ensure_published(store, election_id, now).await?;
    get_tally(store, election_id, office_id, now).await
}

/// Results, and anything they could be rebuilt from, are public once the election has closed.
pub(crate) async fn ensure_published(
    store: &dyn BallotStore,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<()> {
    let status = existing_election(store, election_id).await?.status_at(now);
    if status != ElectionStatus::Closed {
        return Err(StateError::ResultsNotPublished {
            election_id: election_id.into(),
            status,
        }
        .into());
    }
    Ok(())
}

fn tally_office(
    office: &Office,
    candidacies: &[Candidacy],
    votes: &[Vote],
    invalidated: &HashSet<Id>,
    active_members: &[Member],
) -> OfficeTally {
    let candidacies = candidacies
        .iter()
        .filter(|candidacy| candidacy.office_id == office.id)
        .map(|candidacy| (candidacy.id, candidacy))
        .collect::<HashMap<_, _>>();

    // Every standing candidacy appears, even with no votes.
    let mut counts = candidacies
        .values()
        .filter(|candidacy| candidacy.is_standing())
        .map(|candidacy| (candidacy.id, 0))
        .collect::<HashMap<Id, u64>>();
    let (mut blank, mut null, mut invalid, mut total) = (0, 0, 0, 0);
    let mut voters = HashSet::new();

    for vote in votes.iter().filter(|vote| vote.office_id == office.id) {
        total += 1;
        voters.insert(vote.member_id);
        if invalidated.contains(&vote.id) {
            invalid += 1;
            null += 1;
            continue;
        }
        match vote.outcome {
            VoteOutcome::Candidate { candidacy_id } => *counts.entry(candidacy_id).or_default() += 1,
            VoteOutcome::Blank => blank += 1,
            VoteOutcome::Null => null += 1,
        }
    }

    let mut candidates = counts
        .into_iter()
        .map(|(candidacy_id, votes)| {
            let candidacy = candidacies.get(&candidacy_id);
            CandidateCount {
                candidacy_id: candidacy_id.into(),
                member_id: candidacy.map(|c| c.member_id.into()),
                number: candidacy.map(|c| c.number.clone()).unwrap_or_default(),
                votes,
            }
        })
        .collect::<Vec<_>>();
    candidates.sort_by(rank);

    let eligible = active_members
        .iter()
        .filter(|member| office.can_vote_for(member.tier))
        .map(|member| member.id)
        .collect::<HashSet<_>>();
    let eligible_voters = eligible.len() as u64;
    let distinct_voters = voters.len() as u64;
    // Voters who have since been deactivated or excluded no longer count towards participation.
    let participating = voters.intersection(&eligible).count();
    let participation = if eligible_voters == 0 {
        0.0
    } else {
        participating as f64 / eligible_voters as f64
    };

    OfficeTally {
        office_id: office.id.into(),
        office_name: office.name.clone(),
        candidates,
        blank,
        null,
        invalidated: invalid,
        total,
        distinct_voters,
        eligible_voters,
        participation,
    }
}

/// Most votes first, then by ballot number.
fn rank(a: &CandidateCount, b: &CandidateCount) -> Ordering {
    b.votes
        .cmp(&a.votes)
        .then_with(|| compare_numbers(&a.number, &b.number))
}

/// Numeric numbers first, in numeric order, then everything else lexically.
/// This is a total order, so "2" sorts before "10" and "1a" after both.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    number_key(a).cmp(&number_key(b))
}

fn number_key(number: &str) -> (bool, u64, &str) {
    match number.parse::<u64>() {
        Ok(value) => (false, value, number),
        Err(_) => (true, 0, number),
    }
}
