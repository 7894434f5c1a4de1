use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::{
        actions::{ExecutionResult, NodeExecutor, parse_config},
        template::resolve_placeholders,
    },
};

/// Message handed to a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub instance_id: String,
    pub node_id: String,
    pub template: String,
    pub channel: String,
    pub recipients: Vec<String>,
    pub params: Value,
}

/// Host-supplied delivery mechanism.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        message: NotificationMessage,
    ) -> Result<()>;
}

/// Writes notifications to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        message: NotificationMessage,
    ) -> Result<()> {
        info!(
            instance = %message.instance_id,
            node = %message.node_id,
            template = %message.template,
            channel = %message.channel,
            recipients = ?message.recipients,
            "notification"
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct NotificationConfig {
    #[serde(default)]
    template: Option<String>,
    #[serde(default = "default_channel")]
    channel: String,
    #[serde(default)]
    recipients: Vec<String>,
    #[serde(default)]
    params: Value,
}

fn default_channel() -> String {
    "system".to_string()
}

/// Fire-and-continue notification dispatch; always succeeds.
pub struct NotificationExecutor {
    notifier: Arc<dyn Notifier>,
}

impl NotificationExecutor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
        }
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "template": { "type": "string" },
                "channel": { "type": "string" },
                "recipients": { "type": "array", "items": { "type": "string" } },
                "params": {}
            }
        })
    }
}

#[async_trait]
impl NodeExecutor for NotificationExecutor {
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        let config: NotificationConfig = parse_config(&node.config, &Self::schema())?;
        let message = NotificationMessage {
            instance_id: ctx.iid(),
            node_id: node.id.clone(),
            template: config.template.unwrap_or_else(|| node.id.clone()),
            channel: config.channel,
            recipients: config.recipients.iter().map(|r| resolve_placeholders(&Value::String(r.clone()), ctx.vars())).map(|v| text(&v)).collect(),
            params: resolve_placeholders(&config.params, ctx.vars()),
        };
        let outputs = Vars::new().with("notificationSent", true).with("notificationTemplate", &message.template).with("notificationChannel", &message.channel);

        let notifier = self.notifier.clone();
        let nid = node.id.clone();
        let task_ctx = ctx.clone();
        ctx.handle().spawn(async move {
            if let Err(e) = notifier.notify(message).await {
                warn!(node = %nid, error = %e, "notification delivery failed");
                task_ctx.emit_log(&nid, format!("notification delivery failed: {}", e));
            }
        });

        Ok(ExecutionResult::success(outputs))
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}
