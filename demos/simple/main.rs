use procflow::{ChannelEvent, ChannelOptions, InstanceStatus, ManagerBuilder, Vars, WorkflowDefinition};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> procflow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let manager = ManagerBuilder::new().build()?;
    manager.launch();

    let definition = WorkflowDefinition::from_json(include_str!("./workflow.json"))?;
    manager.register_workflow_definition(definition)?;

    let events = ChannelEvent::channel(manager.channel(), ChannelOptions::default())?;
    events.on_complete(|iid| {
        println!("Workflow completed, iid: {}", iid);
    });
    events.on_error(|e| {
        println!("Workflow failed: {:?}", e);
    });
    events.on_suspend(|e| {
        println!("Workflow suspended: {:?}", e);
    });

    let small = manager.start_workflow("order_approval", Vars::new().with("amount", 40).with("owner", "alice")).await?;
    println!("small order: {} visited {:?}", small.status, small.visited());

    let large = manager.start_workflow("order_approval", Vars::new().with("amount", 250).with("owner", "bob")).await?;
    println!("large order: {} visited {:?}", large.status, large.visited());

    if large.status == InstanceStatus::Suspended {
        let large = manager.continue_workflow(&large.id, Vars::new().with("approved", true)).await?;
        println!("large order after approval: {} visited {:?}", large.status, large.visited());
        let outputs: serde_json::Value = large.variables.into();
        println!("Outputs: {:#}", outputs);
    }

    manager.shutdown().await;
    Ok(())
}
