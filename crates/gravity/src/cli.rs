//! Clap derive structures for the `gravity` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gravity -- inspect clusters and operations through a Gravity portal
#[derive(Debug, Parser)]
#[command(
    name = "gravity",
    version,
    about = "Inspect Gravity clusters and their operations",
    long_about = "Talks to the portal API of a Gravity cluster controller.\n\n\
        Lists clusters, follows install, expand, update and other operations\n\
        through their progress and logs, and manages connection profiles.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Portal profile to use
    #[arg(long, short = 'p', env = "GRAVITY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Portal URL (overrides profile)
    #[arg(long, env = "GRAVITY_PORTAL", global = true)]
    pub portal: Option<String>,

    /// Account the cluster belongs to
    #[arg(long, short = 'a', env = "GRAVITY_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Cluster name (overrides profile)
    #[arg(long, short = 'c', env = "GRAVITY_CLUSTER", global = true)]
    pub cluster: Option<String>,

    /// Bearer token (overrides profile credentials)
    #[arg(long, env = "GRAVITY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GRAVITY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "GRAVITY_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "GRAVITY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect clusters
    #[command(alias = "cluster", alias = "sites")]
    Clusters(ClustersArgs),

    /// Inspect cluster operations, their progress and logs
    #[command(alias = "ops", alias = "op")]
    Operations(OperationsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Clusters ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClustersArgs {
    #[command(subcommand)]
    pub command: ClustersCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClustersCommand {
    /// List clusters of an account (all accounts when none is set)
    #[command(alias = "ls")]
    List,

    /// Show one cluster (defaults to the profile's cluster)
    Show {
        /// Cluster name
        name: Option<String>,
    },
}

// ── Operations ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OperationsArgs {
    #[command(subcommand)]
    pub command: OperationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum OperationsCommand {
    /// List operations of the cluster, newest first
    #[command(alias = "ls")]
    List(OperationsFilterArgs),

    /// Show one operation
    Show {
        /// Operation ID
        id: String,
    },

    /// Show the latest progress entry of an operation
    Progress {
        /// Operation ID
        id: String,

        /// Keep polling until the operation finishes
        #[arg(long, short = 'w')]
        watch: bool,

        /// Poll interval when watching (e.g. "2s", "500ms")
        #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
        interval: Duration,
    },

    /// Stream the log of an operation
    Logs {
        /// Operation ID
        id: String,
    },
}

/// Filter flags for `operations list`.
#[derive(Debug, Args)]
pub struct OperationsFilterArgs {
    /// Only operations of this type (repeatable), e.g. `install`, `expand`
    #[arg(long = "type", short = 't', value_enum)]
    pub types: Vec<OperationKind>,

    /// Only operations still in progress
    #[arg(long)]
    pub active: bool,

    /// Only operations that completed successfully
    #[arg(long, conflicts_with = "active")]
    pub complete: bool,

    /// Only operations that completed or failed
    #[arg(long, conflicts_with = "active")]
    pub finished: bool,

    /// Only the oldest matching operation
    #[arg(long, conflicts_with = "last")]
    pub first: bool,

    /// Only the newest matching operation
    #[arg(long)]
    pub last: bool,
}

/// Operation types as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationKind {
    Install,
    Expand,
    Shrink,
    Update,
    Uninstall,
    Gc,
    UpdateEnv,
    UpdateConfig,
    Reconfigure,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard for a new profile
    Init,

    /// Show the effective configuration (secrets are never printed)
    Show,

    /// List configured profiles (the default is marked with *)
    Profiles,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
