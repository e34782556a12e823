use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionStatus, mongodb::Id};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// Voting opens at this time (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting closes at this time (exclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Set while the election holds the single open slot.
    /// A partial unique index guarantees at most one election has this set.
    pub active: bool,
    /// When the election was activated, if ever.
    pub activated_at: Option<BsonDateTime>,
    /// When the election was explicitly closed, if ever.
    pub closed_at: Option<BsonDateTime>,
}

impl ElectionCore {
    /// Create a new, not yet activated, election.
    pub fn new(name: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            start_time,
            end_time,
            active: false,
            activated_at: None,
            closed_at: None,
        }
    }

    /// Derive the lifecycle state at the given instant.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        if self.closed_at.is_some() || now >= self.end_time {
            ElectionStatus::Closed
        } else if self.activated_at.is_none() {
            ElectionStatus::Scheduled
        } else if !self.active {
            // Activated once, then deactivated.
            ElectionStatus::Closed
        } else if now < self.start_time {
            ElectionStatus::Scheduled
        } else {
            ElectionStatus::Open
        }
    }

    /// Are ballots accepted at the given instant?
    pub fn is_open_for_voting(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == ElectionStatus::Open
    }

    /// Could this election still be activated at the given instant?
    pub fn can_activate(&self, now: DateTime<Utc>) -> bool {
        self.activated_at.is_none() && self.closed_at.is_none() && now < self.end_time
    }

    /// Does this election hold the open slot even though its window has passed?
    /// Such a flag is stale and may be cleared when another election activates.
    pub fn holds_stale_slot(&self, now: DateTime<Utc>) -> bool {
        self.active && now >= self.end_time
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
