// Routing tests for `Router`: local versus pooled remote operators.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use url::Url;

use gravity_core::operator::{Accounts, ActivateSiteRequest, Install, Sites};
use gravity_core::{
    Application, ClientFactory, IdentityService, Locator, MemoryBackend, MemoryCatalog,
    NewAccount, NewSite, Operator, OperatorService, Result, Router, RouterConfig, Site, SiteKey,
};

// ── Helpers ─────────────────────────────────────────────────────────

const ACCOUNT: &str = "a1";
const INSTALLED: &str = "edge.example.com";
const FRESH: &str = "new.example.com";

fn package() -> Locator {
    Locator::new("gravitational.io", "telekube", "5.5.0")
}

/// Hands out one shared operator and records every endpoint it was asked for.
struct RecordingFactory {
    remote: Arc<dyn Operator>,
    built: Mutex<Vec<String>>,
}

impl RecordingFactory {
    fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

impl ClientFactory for RecordingFactory {
    fn build(&self, endpoint: &Url) -> Result<Arc<dyn Operator>> {
        self.built.lock().unwrap().push(endpoint.to_string());
        Ok(Arc::clone(&self.remote))
    }
}

async fn service_with(backend: Arc<MemoryBackend>, domains: &[&str]) -> OperatorService {
    let catalog = MemoryCatalog::new();
    catalog.add(Application {
        package: package(),
        manifest: Default::default(),
    });
    let service = OperatorService::new(backend, Arc::new(IdentityService::new()), Arc::new(catalog));
    service
        .create_account(NewAccount {
            id: Some(ACCOUNT.into()),
            org: "example.com".into(),
        })
        .await
        .unwrap();
    for domain in domains {
        service
            .create_site(NewSite::new(ACCOUNT, *domain, package()))
            .await
            .unwrap();
    }
    service
}

struct Fixture {
    router: Router,
    factory: Arc<RecordingFactory>,
}

async fn setup(config: RouterConfig) -> Fixture {
    // Local controller: one installed cluster and one still to install.
    let backend = Arc::new(MemoryBackend::new());
    let local = service_with(backend.clone(), &[INSTALLED, FRESH]).await;
    local
        .activate_site(ActivateSiteRequest {
            key: SiteKey::new(ACCOUNT, INSTALLED),
        })
        .await
        .unwrap();

    // Remote controller: its copy of the installed cluster carries a label.
    let remote = service_with(Arc::new(MemoryBackend::new()), &[]).await;
    let mut req = NewSite::new(ACCOUNT, INSTALLED, package());
    req.labels = BTreeMap::from([("served-by".to_owned(), "remote".to_owned())]);
    remote.create_site(req).await.unwrap();

    let factory = Arc::new(RecordingFactory {
        remote: Arc::new(remote),
        built: Mutex::new(Vec::new()),
    });
    let router = Router::new(Arc::new(local), backend, factory.clone(), config);
    Fixture { router, factory }
}

fn served_remotely(site: &Site) -> bool {
    site.labels.get("served-by").map(String::as_str) == Some("remote")
}

// ── Cluster routing ─────────────────────────────────────────────────

#[tokio::test]
async fn test_installed_cluster_goes_remote() {
    let fixture = setup(RouterConfig::default()).await;

    let site = fixture
        .router
        .get_site(&SiteKey::new(ACCOUNT, INSTALLED))
        .await
        .unwrap();
    assert!(served_remotely(&site));
    assert_eq!(fixture.factory.built(), ["https://edge.example.com:3009/"]);
}

#[tokio::test]
async fn test_remote_clients_are_pooled() {
    let fixture = setup(RouterConfig::default()).await;
    let key = SiteKey::new(ACCOUNT, INSTALLED);

    fixture.router.get_site(&key).await.unwrap();
    fixture.router.get_site(&key).await.unwrap();

    assert_eq!(fixture.factory.built().len(), 1);
    assert_eq!(fixture.router.pool().len(), 1);
}

#[tokio::test]
async fn test_uninstalled_cluster_stays_local() {
    let fixture = setup(RouterConfig::default()).await;

    let site = fixture
        .router
        .get_site(&SiteKey::new(ACCOUNT, FRESH))
        .await
        .unwrap();
    assert!(!served_remotely(&site));
    assert!(fixture.factory.built().is_empty());
    assert!(fixture.router.pool().is_empty());
}

#[tokio::test]
async fn test_listing_never_leaves_process() {
    let fixture = setup(RouterConfig::default()).await;

    let sites = fixture.router.get_sites(ACCOUNT).await.unwrap();
    assert_eq!(sites.len(), 2);
    assert!(fixture.factory.built().is_empty());
}

#[tokio::test]
async fn test_endpoint_override_is_used() {
    let mut config = RouterConfig::default();
    config.endpoints.insert(
        INSTALLED.into(),
        Url::parse("http://127.0.0.1:8080").unwrap(),
    );
    let fixture = setup(config).await;

    fixture
        .router
        .get_site(&SiteKey::new(ACCOUNT, INSTALLED))
        .await
        .unwrap();
    assert_eq!(fixture.factory.built(), ["http://127.0.0.1:8080/"]);
}

#[tokio::test]
async fn test_unknown_cluster_is_not_found() {
    let fixture = setup(RouterConfig::default()).await;

    let err = fixture
        .router
        .get_site(&SiteKey::new(ACCOUNT, "missing.example.com"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ── Wizard routing ──────────────────────────────────────────────────

#[tokio::test]
async fn test_install_start_goes_to_wizard() {
    let fixture = setup(RouterConfig::default()).await;
    let key = SiteKey::new(ACCOUNT, FRESH).operation("op-1");

    // The remote stand-in has no such operation; only the route matters.
    let err = fixture
        .router
        .site_install_operation_start(&key)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        fixture.factory.built(),
        ["https://wizard.new.example.com:3009/"]
    );
}

#[tokio::test]
async fn test_wizard_process_serves_install_locally() {
    let config = RouterConfig {
        wizard: true,
        ..RouterConfig::default()
    };
    let fixture = setup(config).await;
    let key = SiteKey::new(ACCOUNT, FRESH).operation("op-1");

    let err = fixture
        .router
        .site_install_operation_start(&key)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(fixture.factory.built().is_empty());
}

#[tokio::test]
async fn test_router_exposes_local_operator() {
    let fixture = setup(RouterConfig::default()).await;

    let local = fixture.router.local_operator().unwrap();
    let site = local.get_site(&SiteKey::new(ACCOUNT, INSTALLED)).await.unwrap();
    assert!(!served_remotely(&site));
}
