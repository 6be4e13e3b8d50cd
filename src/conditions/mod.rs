//! Conditions and the actions they fire

mod action;
mod condition;

pub use action::Action;
pub use condition::{ConditionNode, Conjunction, StatusPredicate};
