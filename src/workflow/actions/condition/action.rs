use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    ProcflowError, Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::actions::{ExecutionResult, NodeExecutor, parse_config},
};

use super::models::*;

/// Evaluates a single predicate and reports it without side effects.
///
/// A false result is still a successful execution; routing is left to the
/// node's transitions, which can read `conditionResult`.
pub struct ConditionExecutor;

impl ConditionExecutor {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "conditionType": { "type": "string", "enum": ["expression", "comparison", "rule"] },
                "expression": { "type": "string" },
                "conditionExpression": { "type": "string" },
                "rule": { "type": "string" },
                "conditionRule": { "type": "string" },
                "leftOperand": {},
                "operator": { "type": "string" },
                "rightOperand": {},
                "trueBranch": { "type": "string" },
                "falseBranch": { "type": "string" }
            }
        })
    }

    fn evaluate(
        ctx: &Context,
        config: &ConditionConfig,
    ) -> Result<bool> {
        match config.condition_type {
            ConditionType::Expression => {
                let expression = config.expression.as_deref().ok_or_else(|| ProcflowError::Action("condition expression is missing".into()))?;
                ctx.evaluate_bool(expression)
            }
            ConditionType::Comparison => {
                let (Some(left), Some(operator), Some(right)) = (&config.left_operand, config.operator, &config.right_operand) else {
                    return Err(ProcflowError::Action("comparison needs leftOperand, operator and rightOperand".into()));
                };
                compare(&resolve_operand(ctx.vars(), left), operator, &resolve_operand(ctx.vars(), right))
            }
            ConditionType::Rule => Ok(config.rule.as_deref().is_some_and(|rule| evaluate_rule(ctx.vars(), rule))),
        }
    }
}

/// `field.operator.value`, where the field may itself be a dotted path and the
/// value may contain dots. Anything that cannot be decided is false.
fn evaluate_rule(
    vars: &Vars,
    rule: &str,
) -> bool {
    let parts: Vec<&str> = rule.split('.').collect();
    let split = (1..parts.len().saturating_sub(1)).find_map(|i| ComparisonOperator::from_str(parts[i]).ok().map(|op| (i, op)));
    let Some((i, operator)) = split else {
        warn!(rule, "rule must look like field.operator.value");
        return false;
    };
    let field = parts[..i].join(".");
    let Some(actual) = vars.get_path(&field).filter(|v| !v.is_null()) else {
        warn!(rule, field = %field, "rule field has no value");
        return false;
    };
    match compare(actual, operator, &literal(&parts[i + 1..].join("."))) {
        Ok(result) => result,
        Err(e) => {
            warn!(rule, error = %e, "rule evaluation failed");
            false
        }
    }
}

/// `$path` and `data.path` read variables; other strings are literals.
fn resolve_operand(
    vars: &Vars,
    operand: &Value,
) -> Value {
    let Value::String(s) = operand else {
        return operand.clone();
    };
    let path = s.strip_prefix('$').or_else(|| s.strip_prefix("data."));
    match path {
        Some(path) => vars.get_path(path).cloned().unwrap_or(Value::Null),
        None => literal(s),
    }
}

/// Quoted text is a string; numbers and booleans parse; anything else stays text.
fn literal(s: &str) -> Value {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return Value::String(s[1..s.len() - 1].to_string());
    }
    if let Ok(n) = s.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = s.parse::<f64>() {
        return json!(f);
    }
    match s.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn equals(
    left: &Value,
    right: &Value,
) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare_numbers(
    left: &Value,
    right: &Value,
) -> Result<std::cmp::Ordering> {
    match (number(left), number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| ProcflowError::Expression("NaN is not comparable".into())),
        _ => Err(ProcflowError::Expression(format!("cannot compare {} with {} as numbers", left, right))),
    }
}

pub(crate) fn compare(
    left: &Value,
    operator: ComparisonOperator,
    right: &Value,
) -> Result<bool> {
    use ComparisonOperator::*;

    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return Ok(match operator {
            Equals => both,
            NotEquals => !both,
            _ => false,
        });
    }

    let result = match operator {
        Equals => equals(left, right),
        NotEquals => !equals(left, right),
        Greater => compare_numbers(left, right)?.is_gt(),
        Less => compare_numbers(left, right)?.is_lt(),
        GreaterEqual => compare_numbers(left, right)?.is_ge(),
        LessEqual => compare_numbers(left, right)?.is_le(),
        Contains | NotContains => {
            let found = match left {
                Value::Array(items) => items.iter().any(|v| equals(v, right)),
                _ => text(left).contains(&text(right)),
            };
            found == (operator == Contains)
        }
        StartsWith => text(left).starts_with(&text(right)),
        EndsWith => text(left).ends_with(&text(right)),
        Matches => {
            let re = Regex::new(&format!("^(?:{})$", text(right))).map_err(|e| ProcflowError::Expression(e.to_string()))?;
            re.is_match(&text(left))
        }
        In | NotIn => match right {
            Value::Array(items) => items.iter().any(|v| equals(v, left)) == (operator == In),
            _ => false,
        },
    };
    Ok(result)
}

#[async_trait]
impl NodeExecutor for ConditionExecutor {
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        let config: ConditionConfig = parse_config(&node.config, &Self::schema())?;
        let result = match Self::evaluate(&ctx, &config) {
            Ok(result) => result,
            Err(e) => return Ok(ExecutionResult::failed(format!("condition evaluation failed: {}", e))),
        };
        debug!(node = %node.id, condition_type = config.condition_type.as_ref(), result, "condition evaluated");

        let mut outputs = Vars::new()
            .with("conditionResult", result)
            .with("conditionType", config.condition_type.as_ref())
            .with("branchDirection", if result { "true" } else { "false" });
        let selected = if result { &config.true_branch } else { &config.false_branch };
        if let Some(branch) = selected.as_deref().filter(|b| !b.trim().is_empty()) {
            outputs.set("selectedBranch", branch);
        }

        Ok(ExecutionResult::success(outputs))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{ComparisonOperator, compare, literal};
    use crate::{
        common::Vars,
        model::WorkflowNode,
        workflow::actions::{ExecutionStatus, NodeExecutor, condition::ConditionExecutor, test_util},
    };

    async fn run(
        config: Value,
        vars: Vars,
    ) -> crate::workflow::actions::ExecutionResult {
        let node = WorkflowNode::new("cond", "condition").with_config(config);
        ConditionExecutor.execute(test_util::context(vars), &node).await.unwrap()
    }

    #[tokio::test]
    async fn test_expression_condition() {
        let result = run(json!({"expression": "amount > 100", "trueBranch": "big", "falseBranch": "small"}), Vars::new().with("amount", 150)).await;
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(true));
        assert_eq!(result.outputs.get::<String>("selectedBranch"), Some("big".to_string()));

        let result = run(json!({"expression": "amount > 100"}), Vars::new().with("amount", 50)).await;
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(false));
        assert_eq!(result.outputs.get::<String>("branchDirection"), Some("false".to_string()));
        assert!(result.outputs.get::<String>("selectedBranch").is_none());
    }

    #[tokio::test]
    async fn test_comparison_and_rule_conditions() {
        let vars = Vars::new().with("order", json!({"total": 320, "region": "eu-west"}));

        let result = run(json!({"conditionType": "comparison", "leftOperand": "$order.total", "operator": "greater_equal", "rightOperand": "300"}), vars.clone()).await;
        assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(true));

        let result = run(json!({"conditionType": "comparison", "leftOperand": "data.order.region", "operator": "in", "rightOperand": ["us", "eu-west"]}), vars.clone()).await;
        assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(true));

        let result = run(json!({"conditionType": "rule", "rule": "level.equals.3"}), Vars::new().with("level", 3)).await;
        assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(true));
    }

    #[tokio::test]
    async fn test_rule_paths_and_undecidable_rules() {
        let vars = Vars::new().with("order", json!({"amount": 150})).with("x", 2).with("name", "abc");

        for (rule, expected) in [
            ("order.amount.greater.100", true),
            ("x.greater.1.5", true),
            ("x.less_equal.1.5", false),
            ("name.starts_with.ab", true),
            // malformed, missing field, unknown operator, not comparable
            ("only.two", false),
            ("missing.equals.1", false),
            ("x.bigger.1", false),
            ("name.greater.1", false),
        ] {
            let result = run(json!({"conditionType": "rule", "rule": rule}), vars.clone()).await;
            assert_eq!(result.status, ExecutionStatus::Succeeded, "{rule}");
            assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(expected), "{rule}");
        }

        let result = run(json!({"conditionType": "rule"}), vars).await;
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.outputs.get::<bool>("conditionResult"), Some(false));
    }

    #[tokio::test]
    async fn test_evaluation_error_fails_node() {
        let result = run(json!({"expression": "eval('1')"}), Vars::new()).await;
        assert_eq!(result.status, ExecutionStatus::Failed);

        let node = WorkflowNode::new("cond", "condition").with_config(json!({"conditionType": "business"}));
        assert!(ConditionExecutor.execute(test_util::context(Vars::new()), &node).await.is_err());
    }

    #[test]
    fn test_compare_operators() {
        use ComparisonOperator::*;

        assert!(compare(&json!(5), Equals, &json!(5.0)).unwrap());
        assert!(compare(&json!("abc"), StartsWith, &json!("ab")).unwrap());
        assert!(compare(&json!("abc"), EndsWith, &json!("bc")).unwrap());
        assert!(compare(&json!(["a", "b"]), Contains, &json!("b")).unwrap());
        assert!(compare(&json!("hello"), NotContains, &json!("xyz")).unwrap());
        assert!(compare(&json!("A-123"), Matches, &json!("[A-Z]-\\d+")).unwrap());
        assert!(!compare(&json!("xA-123"), Matches, &json!("[A-Z]-\\d+")).unwrap());
        assert!(compare(&json!(3), NotIn, &json!([1, 2])).unwrap());
        assert!(compare(&Value::Null, Equals, &Value::Null).unwrap());
        assert!(compare(&Value::Null, NotEquals, &json!(1)).unwrap());
        assert!(!compare(&Value::Null, Greater, &json!(1)).unwrap());
        assert!(compare(&json!("abc"), Greater, &json!(1)).is_err());
    }

    #[test]
    fn test_literal_parsing() {
        assert_eq!(literal("\"42\""), json!("42"));
        assert_eq!(literal("42"), json!(42));
        assert_eq!(literal("4.5"), json!(4.5));
        assert_eq!(literal("TRUE"), json!(true));
        assert_eq!(literal("pending"), json!("pending"));
    }
}
