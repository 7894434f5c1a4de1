#[allow(clippy::module_inception)]
mod dispatcher;

pub(crate) use dispatcher::{Dispatcher, Step};
