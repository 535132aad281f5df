// ── Leader election control ──
//
// Operations that restart control-plane nodes pause leader election on
// them first and resume it afterwards. The commands go through a
// `Remote` and retry with exponential backoff; nothing else in the
// operator retries on its own.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::model::Server;
use crate::ops::checks::Remote;
use crate::retry::{RetryConfig, retry_with_backoff};

/// Leadership of the controller process itself.
#[async_trait]
pub trait Leadership: Send + Sync {
    /// Give up leadership so another controller takes over.
    async fn step_down(&self) -> Result<()>;
}

fn election_command(action: &str, server: &Server) -> Vec<String> {
    vec![
        "gravity".into(),
        "planet".into(),
        "leader".into(),
        action.into(),
        format!("--public-ip={}", server.advertise_ip),
        format!("--election-key=/planet/cluster/{}/election", server.hostname),
    ]
}

/// Stop `server` from taking part in leader election.
pub async fn pause_leader_election(
    remote: &dyn Remote,
    server: &Server,
    backoff: &RetryConfig,
) -> Result<()> {
    info!(server = %server.hostname, "Pausing leader election");
    let args = election_command("pause", server);
    retry_with_backoff(backoff, "pause leader election", || {
        remote.exec(&server.advertise_ip, &args)
    })
    .await?;
    Ok(())
}

/// Let `server` take part in leader election again.
pub async fn resume_leader_election(
    remote: &dyn Remote,
    server: &Server,
    backoff: &RetryConfig,
) -> Result<()> {
    info!(server = %server.hostname, "Resuming leader election");
    let args = election_command("resume", server);
    retry_with_backoff(backoff, "resume leader election", || {
        remote.exec(&server.advertise_ip, &args)
    })
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::error::CoreError;
    use crate::model::ClusterRole;
    use crate::ops::checks::{BandwidthRequest, DiskRequest, PortsRequest, Probe, ValidateRequest};

    /// Fails `failures` times, then succeeds.
    struct FlakyRemote {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Remote for FlakyRemote {
        async fn exec(&self, _addr: &str, args: &[String]) -> Result<Bytes> {
            assert_eq!(args[3], "pause");
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(CoreError::ConnectionFailed {
                    url: "10.0.0.1".into(),
                    reason: "agent not ready".into(),
                })
            } else {
                Ok(Bytes::new())
            }
        }

        async fn check_ports(&self, _req: PortsRequest) -> Result<Vec<Probe>> {
            Ok(Vec::new())
        }

        async fn check_bandwidth(&self, _req: BandwidthRequest) -> Result<Vec<Probe>> {
            Ok(Vec::new())
        }

        async fn check_disks(&self, _addr: &str, _req: DiskRequest) -> Result<Vec<Probe>> {
            Ok(Vec::new())
        }

        async fn validate(&self, _addr: &str, _req: ValidateRequest) -> Result<Vec<Probe>> {
            Ok(Vec::new())
        }
    }

    fn master() -> Server {
        Server {
            advertise_ip: "10.0.0.1".into(),
            hostname: "node-1".into(),
            role: "master".into(),
            cluster_role: ClusterRole::Master,
            instance_type: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pause_retries_until_agent_answers() {
        let remote = FlakyRemote {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let backoff = RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_interval: Duration::from_millis(50),
            max_elapsed: Duration::from_secs(10),
            multiplier: 2.0,
        };

        pause_leader_election(&remote, &master(), &backoff).await.unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_gives_up_after_budget() {
        let remote = FlakyRemote {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let backoff = RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_interval: Duration::from_millis(200),
            max_elapsed: Duration::from_secs(1),
            multiplier: 2.0,
        };

        let err = pause_leader_election(&remote, &master(), &backoff)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }
}
