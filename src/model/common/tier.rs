use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Member seniority tiers, serialized as their rank.
/// Rank 1 is the most senior; the order is strict and total.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum SeniorityTier {
    Senior = 1,
    Full = 2,
    Associate = 3,
    Junior = 4,
    Trainee = 5,
}

impl SeniorityTier {
    /// Every tier, most senior first.
    pub const ALL: [SeniorityTier; 5] = [
        Self::Senior,
        Self::Full,
        Self::Associate,
        Self::Junior,
        Self::Trainee,
    ];

    /// Numeric rank; lower is more senior.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Look a tier up by rank.
    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.rank() == rank)
    }

    /// Is this tier at least as senior as `other`?
    pub fn at_least(self, other: SeniorityTier) -> bool {
        self.rank() <= other.rank()
    }
}

impl Display for SeniorityTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Senior => "senior",
            Self::Full => "full",
            Self::Associate => "associate",
            Self::Junior => "junior",
            Self::Trainee => "trainee",
        };
        write!(f, "{name}")
    }
}

impl From<SeniorityTier> for Bson {
    fn from(tier: SeniorityTier) -> Self {
        Bson::Int32(tier.rank().into())
    }
}
