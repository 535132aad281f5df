//! Operator layer of a Gravity cluster controller.
//!
//! Everything a controller can do to a cluster is expressed through the
//! [`Operator`] capability traits. This crate provides four stackable
//! implementations of the full union:
//!
//! - **[`OperatorService`]**: the in-process operator over a storage
//!   [`Backend`], an identity store and an application catalog.
//! - **[`OperatorAcl`]**: authorizes every call against a role set before
//!   delegating, with self-service and one-time install token paths.
//! - **[`RemoteOperator`]**: the same contract spoken over the portal HTTP
//!   API of another controller (via `gravity-api`).
//! - **[`Router`]**: picks the local operator or a pooled remote one per
//!   call, based on where the target cluster is served from.
//!
//! Supporting modules hold the domain [`model`], the operation state
//! machine and helpers ([`ops`]), preflight checks and agent coordination,
//! and retry with backoff for the few commands that retry.

pub mod acl;
pub mod apps;
pub mod config;
pub mod error;
pub mod model;
pub mod operator;
pub mod ops;
pub mod remote;
pub mod retry;
pub mod route;
pub mod service;
pub mod storage;
pub mod users;

// ── Primary re-exports ──────────────────────────────────────────────
pub use acl::OperatorAcl;
pub use acl::access::{AccessChecker, Kind, ResourceContext, RoleSet, Verb};
pub use apps::{Applications, MemoryCatalog};
pub use config::{AuthCredentials, PortalConfig, RouterConfig, TlsVerification};
pub use error::{CoreError, Result};
pub use operator::{LogStream, Operator};
pub use ops::OperationsFilter;
pub use remote::RemoteOperator;
pub use route::{ClientFactory, ClientPool, RemoteClientFactory, Router};
pub use service::OperatorService;
pub use storage::{Backend, MemoryBackend};
pub use users::{CertAuthority, IdentityService};

// Model types used by most callers.
pub use model::{
    Account, Application, Locator, NewAccount, NewSite, OperationState, OperationType,
    ProgressEntry, ProgressState, Server, Site, SiteKey, SiteOperation, SiteOperationKey,
    SiteState, User, UserType,
};
