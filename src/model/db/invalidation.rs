use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{db::vote::Vote, mongodb::Id};

/// An administrative correction: the referenced vote no longer counts
/// for a candidate. The vote itself is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInvalidation {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Foreign Key vote ID. At most one invalidation per vote.
    pub vote_id: Id,
    /// Foreign Key election ID, copied from the vote.
    pub election_id: Id,
    /// Foreign Key office ID, copied from the vote.
    pub office_id: Id,
    /// Why the vote was invalidated.
    pub reason: String,
    /// The administrator responsible.
    pub invalidated_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub invalidated_at: DateTime<Utc>,
}

impl VoteInvalidation {
    pub fn new(vote: &Vote, reason: String, invalidated_by: Id, invalidated_at: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            vote_id: vote.id,
            election_id: vote.election_id,
            office_id: vote.office_id,
            reason,
            invalidated_by,
            invalidated_at,
        }
    }
}
