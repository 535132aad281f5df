//! Command dispatch: bridges CLI args -> operator calls -> output formatting.

pub mod clusters;
pub mod config_cmd;
pub mod operations;
pub mod util;

use gravity_core::Operator;

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Dispatch a portal-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    operator: &dyn Operator,
    target: &Target,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Clusters(args) => clusters::handle(operator, target, args, global).await,
        Command::Operations(args) => operations::handle(operator, target, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
