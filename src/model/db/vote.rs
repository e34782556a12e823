use std::net::IpAddr;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::outcome::VoteOutcome, mongodb::Id};

/// Where a ballot submission came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMetadata {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Core vote data, as stored in the database.
/// Votes are never modified once written; there is deliberately no `DerefMut`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key office ID.
    pub office_id: Id,
    /// Foreign Key member ID of the voter.
    pub member_id: Id,
    /// What the member chose.
    pub outcome: VoteOutcome,
    /// Hex HMAC over the fields above and `cast_at`.
    pub integrity_hash: String,
    /// Commit time, at millisecond precision.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Where the submission came from.
    pub origin: OriginMetadata,
}

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
