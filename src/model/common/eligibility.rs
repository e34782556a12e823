//! Pure eligibility rules: which tiers may run for, and vote for, an office.
//!
//! Vote-time decisions only ever look at the office's explicit sets. The
//! hierarchy table in [`super::hierarchy`] is consulted when offices are
//! created and never again.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::tier::SeniorityTier;
use crate::model::db::office::OfficeCore;

/// A set of seniority tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EligibilitySet(BTreeSet<SeniorityTier>);

impl EligibilitySet {
    pub fn contains(&self, tier: SeniorityTier) -> bool {
        self.0.contains(&tier)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tiers in the set, most senior first.
    pub fn tiers(&self) -> impl Iterator<Item = SeniorityTier> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<SeniorityTier> for EligibilitySet {
    fn from_iter<I: IntoIterator<Item = SeniorityTier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[SeniorityTier; N]> for EligibilitySet {
    fn from(tiers: [SeniorityTier; N]) -> Self {
        tiers.into_iter().collect()
    }
}

/// An office with no eligible tiers cannot be contested at all.
pub fn is_electable(office: &OfficeCore) -> bool {
    !office.eligibility.is_empty()
}

/// May a member of this tier stand as a candidate for the office?
pub fn can_run_for(tier: SeniorityTier, office: &OfficeCore) -> bool {
    office.eligibility.contains(tier)
}

/// May a member of this tier vote for the office?
/// Any active member may, unless the office restricts voting to certain tiers.
pub fn can_vote_for(tier: SeniorityTier, office: &OfficeCore) -> bool {
    if !is_electable(office) {
        return false;
    }
    match &office.voting_restriction {
        Some(allowed) => allowed.contains(tier),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{common::hierarchy::OfficeHierarchy, mongodb::Id};

    fn office(eligibility: EligibilitySet, restriction: Option<EligibilitySet>) -> OfficeCore {
        let mut office = OfficeCore::new(Id::new(), "Treasurer", OfficeHierarchy::Board);
        office.eligibility = eligibility;
        office.voting_restriction = restriction;
        office
    }

    #[test]
    fn run_follows_explicit_set_not_hierarchy() {
        // Board recommends Senior and Full, but the administrator opened it to Associates only.
        let office = office([SeniorityTier::Associate].into(), None);
        assert!(can_run_for(SeniorityTier::Associate, &office));
        assert!(!can_run_for(SeniorityTier::Senior, &office));
        assert!(!can_run_for(SeniorityTier::Full, &office));
    }

    #[test]
    fn any_tier_may_vote_without_restriction() {
        let office = office([SeniorityTier::Senior].into(), None);
        for tier in SeniorityTier::ALL {
            assert!(can_vote_for(tier, &office));
        }
    }

    #[test]
    fn restriction_limits_voters() {
        let office = office(
            [SeniorityTier::Senior].into(),
            Some([SeniorityTier::Senior, SeniorityTier::Full].into()),
        );
        assert!(can_vote_for(SeniorityTier::Full, &office));
        assert!(!can_vote_for(SeniorityTier::Junior, &office));
    }

    #[test]
    fn empty_eligibility_fails_closed() {
        let office = office(EligibilitySet::default(), None);
        assert!(!is_electable(&office));
        for tier in SeniorityTier::ALL {
            assert!(!can_run_for(tier, &office));
            assert!(!can_vote_for(tier, &office));
        }
    }

    #[test]
    fn set_is_deduplicated_and_ordered() {
        let set: EligibilitySet = [
            SeniorityTier::Junior,
            SeniorityTier::Senior,
            SeniorityTier::Junior,
        ]
        .into();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.tiers().collect::<Vec<_>>(),
            vec![SeniorityTier::Senior, SeniorityTier::Junior]
        );
    }
}
