mod cache;
mod queue;
mod registry;
mod shutdown;
mod vars;

pub use cache::MemCache;
pub use queue::{BroadcastQueue, Queue};
pub use registry::Registry;
pub use shutdown::Shutdown;
pub use vars::Vars;
