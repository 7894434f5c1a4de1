use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{
    Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::actions::{ExecutionResult, NodeExecutor, parse_config},
};

#[derive(Debug, Default, Deserialize)]
struct DataProcessConfig {
    /// JSON Schema the instance variables must satisfy
    #[serde(default)]
    validate: Option<Value>,
    /// `targetKey -> value`; strings are expressions, anything else a literal
    #[serde(default)]
    transform: Map<String, Value>,
}

/// Validates and reshapes instance variables.
pub struct DataProcessExecutor;

impl DataProcessExecutor {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "validate": { "type": ["object", "boolean"] },
                "transform": { "type": "object" }
            }
        })
    }
}

#[async_trait]
impl NodeExecutor for DataProcessExecutor {
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        let config: DataProcessConfig = parse_config(&node.config, &Self::schema())?;

        if let Some(schema) = &config.validate {
            let validator = match jsonschema::validator_for(schema) {
                Ok(v) => v,
                Err(e) => return Ok(ExecutionResult::failed(format!("invalid validation schema: {}", e))),
            };
            let instance = Value::from(ctx.vars().clone());
            let errors: Vec<String> = validator.iter_errors(&instance).map(|e| e.to_string()).collect();
            if !errors.is_empty() {
                return Ok(ExecutionResult::failed(format!("validation failed: {}", errors.join("; "))));
            }
        }

        let mut outputs = Vars::new();
        for (key, value) in config.transform.iter() {
            let value = match value {
                Value::String(expression) => match ctx.evaluate(expression) {
                    Ok(v) => v,
                    Err(e) => return Ok(ExecutionResult::failed_with(format!("transform '{}' failed: {}", key, e), outputs)),
                },
                literal => literal.clone(),
            };
            outputs.set(key, value);
        }
        ctx.emit_log(&node.id, format!("processed {} keys", outputs.len()));

        Ok(ExecutionResult::success(outputs))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        common::Vars,
        model::WorkflowNode,
        workflow::actions::{DataProcessExecutor, ExecutionStatus, NodeExecutor, test_util},
    };

    #[tokio::test]
    async fn test_transform_expressions_and_literals() {
        let node = WorkflowNode::new("calc", "data_process").with_config(json!({
            "transform": {
                "total": "price * qty",
                "label": "'order-' + id",
                "source": {"kind": "import"}
            }
        }));
        let vars = Vars::new().with("price", 2.5).with("qty", 4).with("id", 7);
        let result = DataProcessExecutor.execute(test_util::context(vars), &node).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.outputs.get::<f64>("total"), Some(10.0));
        assert_eq!(result.outputs.get::<String>("label"), Some("order-7".to_string()));
        assert_eq!(result.outputs.get_path("source.kind"), Some(&json!("import")));
    }

    #[tokio::test]
    async fn test_validation_reports_errors() {
        let node = WorkflowNode::new("check", "data_process").with_config(json!({
            "validate": {
                "type": "object",
                "required": ["amount"],
                "properties": {"amount": {"type": "number", "minimum": 0}}
            }
        }));

        let ok = DataProcessExecutor.execute(test_util::context(Vars::new().with("amount", 10)), &node).await.unwrap();
        assert!(ok.is_success());

        let bad = DataProcessExecutor.execute(test_util::context(Vars::new().with("amount", -1)), &node).await.unwrap();
        assert_eq!(bad.status, ExecutionStatus::Failed);
        assert!(bad.error.unwrap().contains("validation failed"));

        let missing = DataProcessExecutor.execute(test_util::context(Vars::new()), &node).await.unwrap();
        assert_eq!(missing.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_empty_config_is_noop() {
        let node = WorkflowNode::new("noop", "data_process");
        let result = DataProcessExecutor.execute(test_util::context(Vars::new()), &node).await.unwrap();
        assert!(result.is_success());
        assert!(result.outputs.is_empty());
    }
}
