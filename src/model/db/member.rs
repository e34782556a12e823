use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::tier::SeniorityTier, mongodb::Id};

/// Core member data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCore {
    /// Current seniority tier.
    pub tier: SeniorityTier,
    /// Only active members may vote.
    pub active: bool,
    /// Identity of the linked login credential, if any.
    pub credential_id: Option<String>,
}

impl MemberCore {
    pub fn new(tier: SeniorityTier) -> Self {
        Self {
            tier,
            active: true,
            credential_id: None,
        }
    }
}

/// A member without an ID.
pub type NewMember = MemberCore;

/// A member from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub member: MemberCore,
}

impl Member {
    pub fn new(member: MemberCore) -> Self {
        Self {
            id: Id::new(),
            member,
        }
    }
}

impl Deref for Member {
    type Target = MemberCore;

    fn deref(&self) -> &Self::Target {
        &self.member
    }
}

impl DerefMut for Member {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.member
    }
}
