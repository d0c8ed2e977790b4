//! Watch collaborator
//!
//! In watch mode the coordinator keeps rebuilding after the first result,
//! driven by a `WatchSource`:
//! - `FsWatchSource` - native file notifications via `notify`, debounced
//! - `ManualWatchSource` - rebuilds on explicit `trigger` calls

mod fs;
mod source;
mod state;

pub use fs::FsWatchSource;
pub use source::{ChangeStream, ManualWatchSource, WatchSource};
pub use state::WatcherState;
