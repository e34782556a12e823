use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::outcome::{OutcomeKind, VoteOutcome},
    db::{
        invalidation::VoteInvalidation,
        vote::{OriginMetadata, Vote, VoteCore},
    },
};

/// Public view of a vote.
/// Carries nothing that identifies the voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub office_id: ApiId,
    pub outcome: OutcomeKind,
    /// Only present for candidate votes that still count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidacy_id: Option<ApiId>,
    /// Truncated to the minute, so the votes of one ballot cannot be matched up by time.
    pub cast_at: DateTime<Utc>,
    pub invalidated: bool,
}

impl AuditRecord {
    pub fn new(vote: &Vote, invalidated: bool) -> Self {
        let candidacy_id = if invalidated {
            None
        } else {
            vote.outcome.candidacy_id().map(Into::into)
        };
        Self {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            office_id: vote.office_id.into(),
            outcome: vote.outcome.kind(),
            candidacy_id,
            cast_at: to_minute(vote.cast_at),
            invalidated,
        }
    }
}

fn to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_second(0)
        .and_then(|time| time.with_nanosecond(0))
        .unwrap_or(time)
}

/// Full view of a vote, for administrators only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub office_id: ApiId,
    pub member_id: ApiId,
    pub outcome: VoteOutcome,
    pub integrity_hash: String,
    pub cast_at: DateTime<Utc>,
    pub origin: OriginMetadata,
    pub invalidated: bool,
}

impl VoteRecord {
    pub fn new(vote: &Vote, invalidated: bool) -> Self {
        Self {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            office_id: vote.office_id.into(),
            member_id: vote.member_id.into(),
            outcome: vote.outcome,
            integrity_hash: vote.integrity_hash.clone(),
            cast_at: vote.cast_at,
            origin: vote.origin.clone(),
            invalidated,
        }
    }

    /// Rebuild the stored vote, e.g. to re-verify its hash offline.
    pub fn to_vote(&self) -> Vote {
        Vote {
            id: self.vote_id.into(),
            vote: VoteCore {
                election_id: self.election_id.into(),
                office_id: self.office_id.into(),
                member_id: self.member_id.into(),
                outcome: self.outcome,
                integrity_hash: self.integrity_hash.clone(),
                cast_at: self.cast_at,
                origin: self.origin.clone(),
            },
        }
    }
}

/// Result of re-verifying every stored hash of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub election_id: ApiId,
    pub checked: u64,
    /// Votes whose stored hash no longer matches their contents.
    pub tampered: Vec<ApiId>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.tampered.is_empty()
    }
}

/// Body of an invalidation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
    pub reason: String,
}

/// A recorded invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationReceipt {
    pub invalidation_id: ApiId,
    pub vote_id: ApiId,
    pub office_id: ApiId,
    pub reason: String,
    pub invalidated_by: ApiId,
    pub invalidated_at: DateTime<Utc>,
}

impl From<&VoteInvalidation> for InvalidationReceipt {
    fn from(invalidation: &VoteInvalidation) -> Self {
        Self {
            invalidation_id: invalidation.id.into(),
            vote_id: invalidation.vote_id.into(),
            office_id: invalidation.office_id.into(),
            reason: invalidation.reason.clone(),
            invalidated_by: invalidation.invalidated_by.into(),
            invalidated_at: invalidation.invalidated_at,
        }
    }
}
