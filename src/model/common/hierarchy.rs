use serde::{Deserialize, Serialize};

use super::{eligibility::EligibilitySet, tier::SeniorityTier};

/// Hierarchy tag carried by every office.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficeHierarchy {
    Executive,
    Board,
    Council,
    Committee,
    Representative,
}

/// For each hierarchy, the most junior tier recommended as eligible to run.
/// Every tier at least as senior is recommended too.
const MOST_JUNIOR_RECOMMENDED: [(OfficeHierarchy, SeniorityTier); 5] = [
    (OfficeHierarchy::Executive, SeniorityTier::Senior),
    (OfficeHierarchy::Board, SeniorityTier::Full),
    (OfficeHierarchy::Council, SeniorityTier::Associate),
    (OfficeHierarchy::Committee, SeniorityTier::Junior),
    (OfficeHierarchy::Representative, SeniorityTier::Trainee),
];

impl OfficeHierarchy {
    pub const ALL: [OfficeHierarchy; 5] = [
        Self::Executive,
        Self::Board,
        Self::Council,
        Self::Committee,
        Self::Representative,
    ];

    /// The default candidacy eligibility for a new office of this hierarchy.
    /// Advisory only: administrators may override it per office.
    pub fn recommended_eligibility(self) -> EligibilitySet {
        let cutoff = MOST_JUNIOR_RECOMMENDED
            .iter()
            .find(|(hierarchy, _)| *hierarchy == self)
            .map(|(_, tier)| *tier);
        match cutoff {
            Some(cutoff) => SeniorityTier::ALL
                .into_iter()
                .filter(|tier| tier.at_least(cutoff))
                .collect(),
            None => EligibilitySet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_hierarchy_has_a_recommendation() {
        for hierarchy in OfficeHierarchy::ALL {
            assert!(!hierarchy.recommended_eligibility().is_empty());
        }
    }

    #[test]
    fn executive_is_senior_only() {
        let set = OfficeHierarchy::Executive.recommended_eligibility();
        assert_eq!(set.tiers().collect::<Vec<_>>(), vec![SeniorityTier::Senior]);
    }

    #[test]
    fn recommendations_widen_down_the_hierarchy() {
        let sizes = OfficeHierarchy::ALL
            .into_iter()
            .map(|h| h.recommended_eligibility().len())
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn recommendation_includes_all_more_senior_tiers() {
        let set = OfficeHierarchy::Council.recommended_eligibility();
        assert!(set.contains(SeniorityTier::Senior));
        assert!(set.contains(SeniorityTier::Full));
        assert!(set.contains(SeniorityTier::Associate));
        assert!(!set.contains(SeniorityTier::Junior));
    }
}
