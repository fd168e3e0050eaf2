//! CLI commands module.

mod batch;
mod build;
mod search;
mod util;

pub use batch::MatchCommand;
pub use build::BuildCommand;
pub use search::SearchCommand;

pub(crate) use util::*;
