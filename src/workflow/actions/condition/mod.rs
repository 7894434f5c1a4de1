mod action;
mod models;

pub use action::ConditionExecutor;
pub use models::{ComparisonOperator, ConditionType};
