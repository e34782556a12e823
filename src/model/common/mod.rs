//! Types and rules shared between the database and API representations.

pub mod election;
pub mod eligibility;
pub mod hierarchy;
pub mod outcome;
pub mod tier;
