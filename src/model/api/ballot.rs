use chrono::{DateTime, Utc};
use rocket::{
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::engine::validator::RejectReason;
use crate::model::{
    api::id::ApiId,
    common::outcome::{OutcomeKind, VoteOutcome},
    db::vote::{OriginMetadata, Vote},
};

/// One entry of a submitted ballot, exactly as the client sent it.
///
/// The wire shape is flag-based so that malformed entries (no choice, or
/// several) can be reported precisely; the validator turns well-formed
/// entries into a [`VoteOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEntry {
    pub office: ApiId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidacy: Option<ApiId>,
    #[serde(default)]
    pub blank: bool,
    #[serde(default)]
    pub null: bool,
}

impl BallotEntry {
    pub fn candidate(office: impl Into<ApiId>, candidacy: impl Into<ApiId>) -> Self {
        Self {
            office: office.into(),
            candidacy: Some(candidacy.into()),
            blank: false,
            null: false,
        }
    }

    pub fn blank(office: impl Into<ApiId>) -> Self {
        Self {
            office: office.into(),
            candidacy: None,
            blank: true,
            null: false,
        }
    }

    pub fn null(office: impl Into<ApiId>) -> Self {
        Self {
            office: office.into(),
            candidacy: None,
            blank: false,
            null: true,
        }
    }

    /// Interpret the entry as exactly one outcome.
    pub fn outcome(&self) -> Result<VoteOutcome, RejectReason> {
        let chosen = [self.candidacy.is_some(), self.blank, self.null]
            .into_iter()
            .filter(|set| *set)
            .count();
        match (chosen, self.candidacy) {
            (0, _) => Err(RejectReason::NoOutcome),
            (1, Some(candidacy)) => Ok(VoteOutcome::Candidate {
                candidacy_id: candidacy.into(),
            }),
            (1, None) if self.blank => Ok(VoteOutcome::Blank),
            (1, None) => Ok(VoteOutcome::Null),
            _ => Err(RejectReason::MultipleOutcomes),
        }
    }
}

/// Confirmation of one committed vote, returned to the voter.
/// Deliberately carries no integrity hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub office_id: ApiId,
    pub outcome: OutcomeKind,
    pub cast_at: DateTime<Utc>,
}

impl From<&Vote> for VoteReceipt {
    fn from(vote: &Vote) -> Self {
        Self {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            office_id: vote.office_id.into(),
            outcome: vote.outcome.kind(),
            cast_at: vote.cast_at,
        }
    }
}

/// Capture where the request came from.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for OriginMetadata {
    type Error = (); // No errors possible.

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(OriginMetadata {
            ip: req.client_ip(),
            user_agent: req.headers().get_one("User-Agent").map(ToString::to_string),
        })
    }
}
