mod channel;
mod context;
mod instance;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use instance::{AsyncOutcome, InstanceHandle};
