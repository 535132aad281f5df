// ── Application packages and manifests ──
//
// Only the slice of the manifest the operator consumes: node profiles with
// their requirements, install flavors, and exposed endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Package locator, `repository/name:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub repository: String,
    pub name: String,
    pub version: String,
}

impl Locator {
    pub fn new(
        repository: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Same package, any version.
    pub fn same_package(&self, other: &Locator) -> bool {
        self.repository == other.repository && self.name == other.name
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.repository, self.name, self.version)
    }
}

impl FromStr for Locator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::bad_parameter(format!("invalid package locator {s:?}"));
        let (repository, rest) = s.split_once('/').ok_or_else(invalid)?;
        let (name, version) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if repository.is_empty() || name.is_empty() || version.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(repository, name, version))
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Manifest ─────────────────────────────────────────────────────────

/// Hardware and OS requirements of a node profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub min_cpus: u32,
    #[serde(default)]
    pub min_ram_mb: u64,
    /// Accepted OS names (`centos`, `ubuntu`, ...). Empty accepts any.
    #[serde(default)]
    pub os: Vec<String>,
    /// TCP ports that must be free on the node.
    #[serde(default)]
    pub tcp_ports: Vec<u16>,
    /// Minimum free space per mount point, in MB.
    #[serde(default)]
    pub volumes: Vec<VolumeRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequirement {
    pub path: String,
    pub min_free_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Requirements,
}

/// Required node count per profile for one cluster topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub name: String,
    pub nodes: Vec<FlavorNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorNode {
    pub profile: String,
    pub count: u32,
}

/// A service the application exposes once installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub port: u16,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "https".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub profiles: Vec<NodeProfile>,
    #[serde(default)]
    pub flavors: Vec<Flavor>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
}

impl Manifest {
    pub fn profile(&self, name: &str) -> Result<&NodeProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CoreError::not_found("node profile", name))
    }

    pub fn flavor(&self, name: &str) -> Result<&Flavor> {
        self.flavors
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| CoreError::not_found("flavor", name))
    }
}

/// An application package with its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub package: Locator,
    #[serde(default)]
    pub manifest: Manifest,
}
