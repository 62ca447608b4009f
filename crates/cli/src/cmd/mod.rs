mod hash;
mod isolate;
mod plan;
mod workspace;

pub use hash::{HashArgs, cmd_hash};
pub use isolate::{IsolateArgs, cmd_isolate};
pub use plan::{PlanArgs, cmd_plan};
pub use workspace::cmd_workspace;
