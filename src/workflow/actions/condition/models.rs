use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a condition node decides
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionType {
    /// a boolean expression over the instance variables
    #[default]
    Expression,
    /// `leftOperand operator rightOperand`
    Comparison,
    /// `field.operator.value`
    Rule,
}

/// Comparison operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    // for number
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    // for string or array
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    In,
    NotIn,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(default)]
    pub condition_type: ConditionType,
    #[serde(default, alias = "conditionExpression")]
    pub expression: Option<String>,
    #[serde(default, alias = "conditionRule")]
    pub rule: Option<String>,
    #[serde(default)]
    pub left_operand: Option<Value>,
    #[serde(default)]
    pub operator: Option<ComparisonOperator>,
    #[serde(default)]
    pub right_operand: Option<Value>,
    #[serde(default)]
    pub true_branch: Option<String>,
    #[serde(default)]
    pub false_branch: Option<String>,
}
