// ── Operation state machine and helpers ──

pub mod agents;
pub mod checks;
pub mod filter;
pub mod leader;
pub mod state;
pub mod utils;

pub use agents::{AgentService, FlavorMatch, ReportDiff};
pub use checks::{
    Probe, ProbeSeverity, ProbeStatus, Remote, RemoteCommands, ValidateServersResponse,
    format_validation_error,
};
pub use filter::OperationsFilter;
pub use leader::Leadership;
