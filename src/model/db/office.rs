use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        eligibility::{self, EligibilitySet},
        hierarchy::OfficeHierarchy,
        tier::SeniorityTier,
    },
    mongodb::Id,
};

/// Grouping and display order for offices. Plays no part in voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeCategory {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub display_order: u32,
}

/// Core office data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key category ID, if the office is grouped.
    pub category_id: Option<Id>,
    /// Office title.
    pub name: String,
    /// Position of the office on the ballot.
    pub display_order: u32,
    /// Hierarchy tag.
    pub hierarchy: OfficeHierarchy,
    /// Tiers that may stand for this office. Empty means nobody: the office is not electable.
    pub eligibility: EligibilitySet,
    /// Tiers that may vote for this office. `None` means any active member.
    pub voting_restriction: Option<EligibilitySet>,
    /// Must every eligible voter answer this office on their ballot?
    pub mandatory: bool,
    /// May this office receive blank votes?
    pub allow_blank: bool,
}

impl OfficeCore {
    /// Create an office with the eligibility recommended for its hierarchy.
    pub fn new(election_id: Id, name: impl Into<String>, hierarchy: OfficeHierarchy) -> Self {
        Self {
            election_id,
            category_id: None,
            name: name.into(),
            display_order: 0,
            hierarchy,
            eligibility: hierarchy.recommended_eligibility(),
            voting_restriction: None,
            mandatory: false,
            allow_blank: true,
        }
    }

    pub fn can_run_for(&self, tier: SeniorityTier) -> bool {
        eligibility::can_run_for(tier, self)
    }

    pub fn can_vote_for(&self, tier: SeniorityTier) -> bool {
        eligibility::can_vote_for(tier, self)
    }
}

/// An office without an ID.
pub type NewOffice = OfficeCore;

/// An office from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub office: OfficeCore,
}

impl Office {
    pub fn new(office: OfficeCore) -> Self {
        Self {
            id: Id::new(),
            office,
        }
    }
}

impl Deref for Office {
    type Target = OfficeCore;

    fn deref(&self) -> &Self::Target {
        &self.office
    }
}

impl DerefMut for Office {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.office
    }
}
