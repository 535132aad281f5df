// ── Domain model ──

pub mod account;
pub mod agent;
pub mod app;
pub mod cluster;
pub mod keys;
pub mod operation;
pub mod site;
pub mod user;

pub use account::{Account, NewAccount};
pub use agent::{AgentReport, OsInfo, ServerInfo, ServerInfos, VolumeInfo};
pub use app::{
    Application, EndpointSpec, Flavor, FlavorNode, Locator, Manifest, NodeProfile, Requirements,
    VolumeRequirement,
};
pub use cluster::{
    Alert, AuditEvent, AuthGateway, ClusterCertificate, ClusterConfiguration, ClusterEnvironment,
    ClusterNode, Endpoint, LogForwarder, PersistentStorage, SmtpConfig,
};
pub use keys::{SiteKey, SiteOperationKey};
pub use operation::{
    COMPLETED, ExpandDetails, FINAL_STEP, InstallDetails, LogEntry, OperationDetails,
    OperationState, OperationType, ProgressEntry, ProgressState, ReconfigureDetails,
    ServerProfileRequest, ShrinkDetails, SiteOperation, UninstallDetails, UpdateConfigDetails,
    UpdateDetails, UpdateEnvironDetails,
};
pub use site::{ClusterRole, ClusterState, NewSite, Server, Site, SiteState};
pub use user::{
    ApiKey, InstallToken, ProvisioningToken, ProvisioningTokenType, User, UserInvite, UserToken,
    UserTokenType, UserType,
};
