// ── Role-based access checks ──
//
// A role set is a list of allow and deny rules over (kind, verb) pairs,
// optionally scoped to clusters and repositories. Deny rules win over
// allow rules.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{CoreError, Result};
use crate::model::{InstallToken, User, UserType};

/// Namespace every operator resource lives in.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Role name granting every permission.
pub const ADMIN_ROLE: &str = "admin";

/// Role name granting read and list on everything.
pub const READER_ROLE: &str = "reader";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Kind {
    Account,
    Cluster,
    User,
    Token,
    ApiKey,
    App,
    Repository,
    SmtpConfig,
    Alert,
    LogForwarder,
    TlsKeyPair,
    AuthGateway,
    RuntimeEnvironment,
    ClusterConfiguration,
    PersistentStorage,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    List,
    Read,
    Create,
    Update,
    Delete,
    Connect,
}

/// What a check is about: the cluster and the repository of its app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceContext {
    pub cluster: Option<String>,
    pub repository: Option<String>,
}

impl ResourceContext {
    pub fn cluster(domain: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            cluster: Some(domain.into()),
            repository: Some(repository.into()),
        }
    }

    pub fn repository(repository: impl Into<String>) -> Self {
        Self {
            cluster: None,
            repository: Some(repository.into()),
        }
    }
}

pub trait AccessChecker: Send + Sync {
    /// `Ok(())` when the caller may perform `verb` on `kind` within `ctx`.
    ///
    /// A rule scoped to clusters or repositories only matches a context
    /// that names one of them; with `allow_wildcard` it also matches a
    /// context that names none.
    fn check_access_to_rule(
        &self,
        ctx: &ResourceContext,
        namespace: &str,
        kind: Kind,
        verb: Verb,
        allow_wildcard: bool,
    ) -> Result<()>;
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    pub kinds: Vec<Kind>,
    pub verbs: Vec<Verb>,
    /// Empty means any cluster.
    #[serde(default)]
    pub clusters: Vec<String>,
    /// Empty means any repository.
    #[serde(default)]
    pub repositories: Vec<String>,
}

fn scope_matches(scope: &[String], value: Option<&String>, allow_wildcard: bool) -> bool {
    if scope.is_empty() {
        return true;
    }
    match value {
        Some(value) => scope.iter().any(|s| s == value),
        None => allow_wildcard,
    }
}

impl RoleRule {
    pub fn new(kinds: &[Kind], verbs: &[Verb]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            verbs: verbs.to_vec(),
            ..Default::default()
        }
    }

    pub fn for_clusters(mut self, clusters: impl IntoIterator<Item = String>) -> Self {
        self.clusters.extend(clusters);
        self
    }

    pub fn for_repositories(mut self, repositories: impl IntoIterator<Item = String>) -> Self {
        self.repositories.extend(repositories);
        self
    }

    fn matches(&self, ctx: &ResourceContext, kind: Kind, verb: Verb, allow_wildcard: bool) -> bool {
        self.kinds.contains(&kind)
            && self.verbs.contains(&verb)
            && scope_matches(&self.clusters, ctx.cluster.as_ref(), allow_wildcard)
            && scope_matches(&self.repositories, ctx.repository.as_ref(), allow_wildcard)
    }

    /// Deny rules apply whether or not the context names a scope.
    fn denies(&self, ctx: &ResourceContext, kind: Kind, verb: Verb) -> bool {
        self.matches(ctx, kind, verb, true)
    }
}

/// Allow and deny rules of one caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub allow: Vec<RoleRule>,
    #[serde(default)]
    pub deny: Vec<RoleRule>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, rule: RoleRule) -> Self {
        self.allow.push(rule);
        self
    }

    pub fn deny(mut self, rule: RoleRule) -> Self {
        self.deny.push(rule);
        self
    }

    /// Everything on everything.
    pub fn admin() -> Self {
        let kinds: Vec<Kind> = Kind::iter().collect();
        let verbs: Vec<Verb> = Verb::iter().collect();
        Self::new().allow(RoleRule::new(&kinds, &verbs))
    }

    /// Read and list on everything.
    pub fn reader() -> Self {
        let kinds: Vec<Kind> = Kind::iter().collect();
        Self::new().allow(RoleRule::new(&kinds, &[Verb::List, Verb::Read]))
    }

    /// What a bound install token lets its holder do: create and drive
    /// the one cluster it is bound to, from the one repository.
    pub fn for_install_token(token: &InstallToken) -> Self {
        let clusters: Vec<String> = token.site_domain.iter().cloned().collect();
        let repositories: Vec<String> = token.repository.iter().cloned().collect();
        Self::new()
            .allow(
                RoleRule::new(
                    &[Kind::Cluster],
                    &[Verb::Create, Verb::Read, Verb::Update, Verb::List],
                )
                .for_clusters(clusters.clone())
                .for_repositories(repositories.clone()),
            )
            .allow(
                RoleRule::new(&[Kind::App, Kind::Repository], &[Verb::Read, Verb::List])
                    .for_repositories(repositories),
            )
            .allow(RoleRule::new(&[Kind::Token], &[Verb::Create, Verb::Read]).for_clusters(clusters))
    }

    /// Built-in roles by name plus the defaults of the user type.
    pub fn for_user(user: &User) -> Self {
        let mut set = match user.user_type {
            UserType::Admin => Self::admin(),
            UserType::Agent => Self::new().allow(RoleRule::new(
                &[Kind::Cluster],
                &[Verb::Read, Verb::Update, Verb::List],
            )),
            UserType::Regular => Self::new(),
        };
        for role in &user.roles {
            let extra = match role.as_str() {
                ADMIN_ROLE => Self::admin(),
                READER_ROLE => Self::reader(),
                _ => continue,
            };
            set.allow.extend(extra.allow);
            set.deny.extend(extra.deny);
        }
        set
    }
}

impl AccessChecker for RoleSet {
    fn check_access_to_rule(
        &self,
        ctx: &ResourceContext,
        namespace: &str,
        kind: Kind,
        verb: Verb,
        allow_wildcard: bool,
    ) -> Result<()> {
        if namespace != DEFAULT_NAMESPACE {
            return Err(CoreError::access_denied(format!(
                "{verb} on {kind} in namespace {namespace}"
            )));
        }
        if self.deny.iter().any(|rule| rule.denies(ctx, kind, verb)) {
            return Err(CoreError::access_denied(format!("{verb} on {kind} is denied")));
        }
        if self
            .allow
            .iter()
            .any(|rule| rule.matches(ctx, kind, verb, allow_wildcard))
        {
            return Ok(());
        }
        Err(CoreError::access_denied(format!("{verb} on {kind}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(set: &RoleSet, ctx: &ResourceContext, kind: Kind, verb: Verb) -> bool {
        set.check_access_to_rule(ctx, DEFAULT_NAMESPACE, kind, verb, false)
            .is_ok()
    }

    #[test]
    fn deny_wins_over_allow() {
        let set = RoleSet::admin().deny(RoleRule::new(&[Kind::User], &[Verb::Delete]));
        let ctx = ResourceContext::default();
        assert!(check(&set, &ctx, Kind::User, Verb::Read));
        assert!(!check(&set, &ctx, Kind::User, Verb::Delete));
    }

    #[test]
    fn scoped_rule_needs_matching_context() {
        let set = RoleSet::new().allow(
            RoleRule::new(&[Kind::Cluster], &[Verb::Read]).for_clusters(["a.com".to_owned()]),
        );
        assert!(check(
            &set,
            &ResourceContext::cluster("a.com", "repo"),
            Kind::Cluster,
            Verb::Read
        ));
        assert!(!check(
            &set,
            &ResourceContext::cluster("b.com", "repo"),
            Kind::Cluster,
            Verb::Read
        ));
        // Unscoped context only with the wildcard flag.
        let ctx = ResourceContext::default();
        assert!(!check(&set, &ctx, Kind::Cluster, Verb::Read));
        assert!(
            set.check_access_to_rule(&ctx, DEFAULT_NAMESPACE, Kind::Cluster, Verb::Read, true)
                .is_ok()
        );
    }

    #[test]
    fn install_token_role_is_narrow() {
        let token = InstallToken {
            token: "t".into(),
            account_id: "a1".into(),
            user_email: "agent@a1".into(),
            site_domain: Some("example.com".into()),
            repository: Some("repo.io".into()),
            expires: None,
        };
        let set = RoleSet::for_install_token(&token);
        assert!(check(
            &set,
            &ResourceContext::cluster("example.com", "repo.io"),
            Kind::Cluster,
            Verb::Create
        ));
        assert!(!check(
            &set,
            &ResourceContext::cluster("example.com", "other.io"),
            Kind::Cluster,
            Verb::Create
        ));
        assert!(!check(
            &set,
            &ResourceContext::cluster("other.com", "repo.io"),
            Kind::Cluster,
            Verb::Create
        ));
        assert!(!check(
            &set,
            &ResourceContext::cluster("example.com", "repo.io"),
            Kind::Cluster,
            Verb::Delete
        ));
    }

    #[test]
    fn user_roles_resolve() {
        let mut user = User::new("bob", UserType::Regular);
        assert!(!check(
            &RoleSet::for_user(&user),
            &ResourceContext::default(),
            Kind::Cluster,
            Verb::Read
        ));
        user.roles.push(READER_ROLE.into());
        let set = RoleSet::for_user(&user);
        assert!(check(&set, &ResourceContext::default(), Kind::Cluster, Verb::Read));
        assert!(!check(&set, &ResourceContext::default(), Kind::Cluster, Verb::Create));
    }
}
