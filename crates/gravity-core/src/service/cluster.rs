use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::{
    ALERT, CERTIFICATE, CONFIGURATION, ENVIRONMENT, LOG_FORWARDER, NewOperation, OperatorService,
    PERIODIC_UPDATES, PERSISTENT_STORAGE, SINGLETON, SMTP,
};
use crate::apps::is_newer_version;
use crate::error::{CoreError, Result};
use crate::model::{
    Alert, ClusterCertificate, ClusterConfiguration, ClusterEnvironment, Locator, LogForwarder,
    OperationDetails, PersistentStorage, SiteKey, SiteOperationKey, SmtpConfig,
    UpdateConfigDetails, UpdateEnvironDetails,
};
use crate::operator::{
    Certificates, ClusterConfig, CreateUpdateConfigOperationRequest,
    CreateUpdateEnvOperationRequest, DownloadUpdateRequest, EnablePeriodicUpdatesRequest, Leader,
    LogForwarders, Monitoring, PersistentStorageConfig, RuntimeEnvironment, Smtp,
    UpdateCertificateRequest, UpdatePersistentStorageRequest, Updates,
};

#[derive(Debug, Serialize, Deserialize)]
struct PeriodicUpdates {
    interval_secs: u64,
}

/// A PEM block with a parseable X.509 certificate.
fn check_certificate(pem: &str) -> Result<()> {
    let (_, block) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| CoreError::bad_parameter(format!("invalid certificate PEM: {e}")))?;
    X509Certificate::from_der(&block.contents)
        .map_err(|e| CoreError::bad_parameter(format!("invalid certificate: {e}")))?;
    Ok(())
}

fn check_private_key(pem: &str) -> Result<()> {
    let (_, block) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| CoreError::bad_parameter(format!("invalid private key PEM: {e}")))?;
    if !block.label.ends_with("PRIVATE KEY") {
        return Err(CoreError::bad_parameter(format!(
            "expected a private key, got a {} block",
            block.label
        )));
    }
    Ok(())
}

// ── Monitoring and SMTP ──────────────────────────────────────────────

#[async_trait]
impl Monitoring for OperatorService {
    async fn get_alerts(&self, key: &SiteKey) -> Result<Vec<Alert>> {
        self.site(key).await?;
        self.list_documents(&key.site_domain, ALERT).await
    }

    async fn update_alert(&self, key: &SiteKey, alert: Alert) -> Result<()> {
        self.site(key).await?;
        if alert.name.is_empty() {
            return Err(CoreError::bad_parameter("alert name is required"));
        }
        self.put_document(&key.site_domain, ALERT, &alert.name, &alert)
            .await
    }

    async fn delete_alert(&self, key: &SiteKey, name: &str) -> Result<()> {
        self.site(key).await?;
        self.delete_document(&key.site_domain, ALERT, name).await
    }
}

#[async_trait]
impl Smtp for OperatorService {
    async fn get_smtp_config(&self, key: &SiteKey) -> Result<SmtpConfig> {
        self.site(key).await?;
        self.get_document(&key.site_domain, SMTP, SINGLETON).await
    }

    async fn update_smtp_config(&self, key: &SiteKey, config: SmtpConfig) -> Result<()> {
        config.check()?;
        self.site(key).await?;
        self.put_document(&key.site_domain, SMTP, SINGLETON, &config)
            .await
    }

    async fn delete_smtp_config(&self, key: &SiteKey) -> Result<()> {
        self.site(key).await?;
        self.delete_document(&key.site_domain, SMTP, SINGLETON)
            .await
    }
}

// ── Log forwarders ───────────────────────────────────────────────────

#[async_trait]
impl LogForwarders for OperatorService {
    async fn get_log_forwarders(&self, key: &SiteKey) -> Result<Vec<LogForwarder>> {
        self.site(key).await?;
        self.list_documents(&key.site_domain, LOG_FORWARDER).await
    }

    async fn create_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        forwarder.check()?;
        self.site(key).await?;
        match self
            .get_document::<LogForwarder>(&key.site_domain, LOG_FORWARDER, &forwarder.name)
            .await
        {
            Ok(_) => Err(CoreError::already_exists(format!(
                "log forwarder {} already exists",
                forwarder.name
            ))),
            Err(e) if e.is_not_found() => {
                self.put_document(&key.site_domain, LOG_FORWARDER, &forwarder.name, &forwarder)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn update_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        forwarder.check()?;
        self.site(key).await?;
        self.get_document::<LogForwarder>(&key.site_domain, LOG_FORWARDER, &forwarder.name)
            .await?;
        self.put_document(&key.site_domain, LOG_FORWARDER, &forwarder.name, &forwarder)
            .await
    }

    async fn delete_log_forwarder(&self, key: &SiteKey, name: &str) -> Result<()> {
        self.site(key).await?;
        self.delete_document(&key.site_domain, LOG_FORWARDER, name)
            .await
    }
}

// ── Certificate ──────────────────────────────────────────────────────

#[async_trait]
impl Certificates for OperatorService {
    async fn get_cluster_certificate(
        &self,
        key: &SiteKey,
        with_secrets: bool,
    ) -> Result<ClusterCertificate> {
        self.site(key).await?;
        let mut cert: ClusterCertificate = self
            .get_document(&key.site_domain, CERTIFICATE, SINGLETON)
            .await?;
        if !with_secrets {
            cert.private_key.clear();
        }
        Ok(cert)
    }

    async fn update_cluster_certificate(
        &self,
        req: UpdateCertificateRequest,
    ) -> Result<ClusterCertificate> {
        req.check()?;
        self.site(&req.key).await?;
        check_certificate(&req.certificate)?;
        check_private_key(&req.private_key)?;

        let mut certificate = req.certificate;
        if !req.intermediate.is_empty() {
            check_certificate(&req.intermediate)?;
            if !certificate.ends_with('\n') {
                certificate.push('\n');
            }
            certificate.push_str(&req.intermediate);
        }
        let stored = ClusterCertificate {
            certificate,
            private_key: req.private_key,
        };
        self.put_document(&req.key.site_domain, CERTIFICATE, SINGLETON, &stored)
            .await?;
        info!(cluster = %req.key.site_domain, "Cluster certificate updated");
        Ok(ClusterCertificate {
            private_key: String::new(),
            ..stored
        })
    }

    async fn delete_cluster_certificate(&self, key: &SiteKey) -> Result<()> {
        self.site(key).await?;
        self.delete_document(&key.site_domain, CERTIFICATE, SINGLETON)
            .await
    }
}

#[async_trait]
impl Leader for OperatorService {
    async fn step_down(&self, key: &SiteKey) -> Result<()> {
        self.site(key).await?;
        let leadership = self.leadership()?;
        info!(cluster = %key.site_domain, "Stepping down as leader");
        leadership.step_down().await
    }
}

// ── Updates ──────────────────────────────────────────────────────────

#[async_trait]
impl Updates for OperatorService {
    async fn check_for_update(&self, key: &SiteKey) -> Result<Option<Locator>> {
        let site = self.site(key).await?;
        let current = &site.app.package;
        let latest = self
            .apps
            .get_latest(&current.repository, &current.name)
            .await?;
        if is_newer_version(&latest.package.version, &current.version) {
            info!(cluster = %site.domain, current = %current, latest = %latest.package, "Update available");
            return Ok(Some(latest.package));
        }
        Ok(None)
    }

    async fn download_update(&self, req: DownloadUpdateRequest) -> Result<()> {
        let site = self.site(&req.key).await?;
        if !site.app.package.same_package(&req.application) {
            return Err(CoreError::bad_parameter(format!(
                "{} is not an update of {}",
                req.application, site.app.package
            )));
        }
        self.apps.get_app(&req.application).await?;
        info!(cluster = %site.domain, package = %req.application, "Update downloaded");
        Ok(())
    }

    async fn enable_periodic_updates(&self, req: EnablePeriodicUpdatesRequest) -> Result<()> {
        req.check()?;
        self.site(&req.key).await?;
        let settings = PeriodicUpdates {
            interval_secs: req.interval.as_secs(),
        };
        self.put_document(&req.key.site_domain, PERIODIC_UPDATES, SINGLETON, &settings)
            .await
    }

    async fn disable_periodic_updates(&self, key: &SiteKey) -> Result<()> {
        self.site(key).await?;
        match self
            .delete_document(&key.site_domain, PERIODIC_UPDATES, SINGLETON)
            .await
        {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

// ── Environment, configuration, storage ──────────────────────────────

#[async_trait]
impl RuntimeEnvironment for OperatorService {
    async fn get_cluster_environment_variables(
        &self,
        key: &SiteKey,
    ) -> Result<ClusterEnvironment> {
        self.site(key).await?;
        self.get_document_or_default(&key.site_domain, ENVIRONMENT)
            .await
    }

    async fn create_update_env_operation(
        &self,
        req: CreateUpdateEnvOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.create_operation(NewOperation::new(
            req.key,
            OperationDetails::UpdateEnviron(UpdateEnvironDetails { env: req.env }),
        ))
        .await
    }
}

#[async_trait]
impl ClusterConfig for OperatorService {
    async fn get_cluster_configuration(&self, key: &SiteKey) -> Result<ClusterConfiguration> {
        self.site(key).await?;
        self.get_document_or_default(&key.site_domain, CONFIGURATION)
            .await
    }

    async fn create_update_config_operation(
        &self,
        req: CreateUpdateConfigOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        self.create_operation(NewOperation::new(
            req.key,
            OperationDetails::UpdateConfig(UpdateConfigDetails { config: req.config }),
        ))
        .await
    }
}

#[async_trait]
impl PersistentStorageConfig for OperatorService {
    async fn get_persistent_storage(&self, key: &SiteKey) -> Result<PersistentStorage> {
        self.site(key).await?;
        self.get_document_or_default(&key.site_domain, PERSISTENT_STORAGE)
            .await
    }

    async fn update_persistent_storage(&self, req: UpdatePersistentStorageRequest) -> Result<()> {
        self.site(&req.key).await?;
        self.put_document(
            &req.key.site_domain,
            PERSISTENT_STORAGE,
            SINGLETON,
            &req.resource,
        )
        .await
    }
}
