use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    ProcflowError, Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::{
        actions::{ExecutionResult, NodeExecutor, parse_config},
        template::resolve_placeholders,
    },
};

/// Host-supplied bridge to external services.
#[async_trait]
pub trait ServiceInvoker: Send + Sync {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: Value,
    ) -> Result<Value>;
}

/// Default invoker; every call fails until the host supplies a real one.
pub struct UnconfiguredServiceInvoker;

#[async_trait]
impl ServiceInvoker for UnconfiguredServiceInvoker {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        _: Value,
    ) -> Result<Value> {
        Err(ProcflowError::Action(format!("no service invoker configured for {}.{}", service, method)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceCallConfig {
    service_name: String,
    method_name: String,
    #[serde(default)]
    params: Value,
    /// dispatch and return without waiting for the reply
    #[serde(default, rename = "async")]
    is_async: bool,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

/// Invokes `serviceName.methodName` through the [`ServiceInvoker`].
pub struct ServiceCallExecutor {
    invoker: Arc<dyn ServiceInvoker>,
}

impl ServiceCallExecutor {
    pub fn new(invoker: Arc<dyn ServiceInvoker>) -> Self {
        Self {
            invoker,
        }
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "serviceName": { "type": "string", "minLength": 1 },
                "methodName": { "type": "string", "minLength": 1 },
                "params": {},
                "async": { "type": "boolean" },
                "timeoutSeconds": { "type": "integer", "minimum": 1 }
            },
            "required": ["serviceName", "methodName"]
        })
    }
}

#[async_trait]
impl NodeExecutor for ServiceCallExecutor {
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        let config: ServiceCallConfig = parse_config(&node.config, &Self::schema())?;
        let params = resolve_placeholders(&config.params, ctx.vars());
        let target = format!("{}.{}", config.service_name, config.method_name);
        debug!(node = %node.id, %target, "service call");

        if config.is_async {
            let invoker = self.invoker.clone();
            let ctx = ctx.clone();
            let nid = node.id.clone();
            ctx.handle().clone().spawn(async move {
                if let Err(e) = invoker.invoke(&config.service_name, &config.method_name, params).await {
                    warn!(node = %nid, error = %e, "async service call failed");
                    ctx.emit_log(&nid, format!("async service call failed: {}", e));
                }
            });
            return Ok(ExecutionResult::success(Vars::new().with("dispatched", true).with("service", target)));
        }

        let call = self.invoker.invoke(&config.service_name, &config.method_name, params);
        let result = match config.timeout_seconds {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), call).await {
                Ok(r) => r,
                Err(_) => return Ok(ExecutionResult::failed(format!("service call {} timed out after {}s", target, secs))),
            },
            None => call.await,
        };

        match result {
            Ok(value) => Ok(ExecutionResult::success(Vars::new().with("result", value))),
            Err(e) => Ok(ExecutionResult::failed(format!("service call {} failed: {}", target, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::{ServiceCallExecutor, ServiceInvoker};
    use crate::{
        Result,
        common::Vars,
        model::WorkflowNode,
        workflow::actions::{ExecutionStatus, NodeExecutor, UnconfiguredServiceInvoker, test_util},
    };

    struct Echo;

    #[async_trait]
    impl ServiceInvoker for Echo {
        async fn invoke(
            &self,
            service: &str,
            method: &str,
            params: Value,
        ) -> Result<Value> {
            if method == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(json!({"service": service, "method": method, "params": params}))
        }
    }

    #[tokio::test]
    async fn test_call_resolves_params() {
        let node = WorkflowNode::new("call", "service_call").with_config(json!({
            "serviceName": "billing",
            "methodName": "charge",
            "params": {"customer": "${customer.id}", "memo": "order ${orderId}"}
        }));
        let vars = Vars::new().with("customer", json!({"id": 9})).with("orderId", "A1");
        let result = ServiceCallExecutor::new(Arc::new(Echo)).execute(test_util::context(vars), &node).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.outputs.get_path("result.params"), Some(&json!({"customer": 9, "memo": "order A1"})));
    }

    #[tokio::test]
    async fn test_call_timeout_and_missing_invoker() {
        let node = WorkflowNode::new("call", "service_call").with_config(json!({"serviceName": "s", "methodName": "slow", "timeoutSeconds": 1}));
        let result = ServiceCallExecutor::new(Arc::new(Echo)).execute(test_util::context(Vars::new()), &node).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.error.unwrap().contains("timed out"));

        let node = WorkflowNode::new("call", "service_call").with_config(json!({"serviceName": "s", "methodName": "m"}));
        let result = ServiceCallExecutor::new(Arc::new(UnconfiguredServiceInvoker)).execute(test_util::context(Vars::new()), &node).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_async_call_returns_immediately() {
        let node = WorkflowNode::new("call", "service_call").with_config(json!({"serviceName": "s", "methodName": "slow", "async": true}));
        let result = tokio::time::timeout(Duration::from_secs(1), ServiceCallExecutor::new(Arc::new(Echo)).execute(test_util::context(Vars::new()), &node))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.outputs.get::<bool>("dispatched"), Some(true));
    }

    #[tokio::test]
    async fn test_missing_service_name_is_rejected() {
        let node = WorkflowNode::new("call", "service_call").with_config(json!({"methodName": "m"}));
        assert!(ServiceCallExecutor::new(Arc::new(Echo)).execute(test_util::context(Vars::new()), &node).await.is_err());
    }
}
