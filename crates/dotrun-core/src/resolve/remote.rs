//! HTTP package feed (NuGet v3 protocol).

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::{Error, Result};

use super::local::read_nuspec;
use super::source::{DependencyInfo, PackageIdentity, PackageSource};

/// The public registry's service index.
pub const NUGET_ORG: &str = "https://api.nuget.org/v3/index.json";

/// Resource type of the flat container in a service index.
const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

/// A remote v3 feed.
///
/// `url` is either a service index (`.../index.json`) or a flat container
/// base address. The index is fetched at most once per feed.
pub struct RemoteFeed {
    url: String,
    client: Client,
    base_address: OnceLock<String>,
}

impl RemoteFeed {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(100))
            .user_agent(concat!("dotrun/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Download(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
            base_address: OnceLock::new(),
        })
    }

    /// The public registry.
    pub fn nuget_org() -> Result<Self> {
        Self::new(NUGET_ORG)
    }

    fn base_address(&self) -> Result<&str> {
        if let Some(base) = self.base_address.get() {
            return Ok(base.as_str());
        }

        let base = if self.url.ends_with(".json") {
            self.fetch_base_address()?
        } else {
            self.url.clone()
        };
        let base = base.trim_end_matches('/').to_string();
        tracing::debug!("Package base address for {}: {}", self.url, base);

        Ok(self.base_address.get_or_init(|| base).as_str())
    }

    fn fetch_base_address(&self) -> Result<String> {
        let body = self.get(&self.url)?.ok_or_else(|| {
            Error::Download(format!("service index not found at {}", self.url))
        })?;

        let index: ServiceIndex = serde_json::from_slice(&body)
            .map_err(|e| Error::Manifest(format!("invalid service index {}: {}", self.url, e)))?;

        index
            .resources
            .into_iter()
            .find(|r| r.kind == PACKAGE_BASE_ADDRESS)
            .map(|r| r.id)
            .ok_or_else(|| {
                Error::Manifest(format!(
                    "service index {} has no {} resource",
                    self.url, PACKAGE_BASE_ADDRESS
                ))
            })
    }

    /// `{base}/{id}/{version}/{id}.{version}.nupkg`, all lowercase.
    fn package_url(&self, identity: &PackageIdentity) -> Result<String> {
        let id = identity.lower_id();
        let version = identity.version.to_normalized_string().to_ascii_lowercase();
        Ok(format!(
            "{}/{}/{}/{}.{}.nupkg",
            self.base_address()?,
            id,
            version,
            id,
            version
        ))
    }

    /// GET a URL; `None` on 404.
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Download(format!("request to {} failed: {}", url, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .bytes()
                    .map_err(|e| Error::Download(format!("reading {} failed: {}", url, e)))?;
                Ok(Some(body.to_vec()))
            }
            status => Err(Error::Download(format!("{} returned {}", url, status))),
        }
    }
}

impl std::fmt::Debug for RemoteFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFeed").field("url", &self.url).finish()
    }
}

impl PackageSource for RemoteFeed {
    fn name(&self) -> &str {
        &self.url
    }

    fn is_local(&self) -> bool {
        false
    }

    fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &str,
    ) -> Result<Option<DependencyInfo>> {
        // The flat container serves manifests next to archives.
        let id = identity.lower_id();
        let version = identity.version.to_normalized_string().to_ascii_lowercase();
        let url = format!("{}/{}/{}/{}.nuspec", self.base_address()?, id, version, id);

        let Some(body) = self.get(&url)? else {
            return Ok(None);
        };

        let nuspec = match std::str::from_utf8(&body) {
            Ok(xml) => super::nuspec::Nuspec::parse(xml.trim_start_matches('\u{feff}'))?,
            // Some servers only serve the archive; read the manifest from it.
            Err(_) => read_nuspec(&self.download(identity)?)?,
        };

        Ok(Some(DependencyInfo {
            identity: PackageIdentity::new(nuspec.id.clone(), identity.version.clone()),
            dependencies: nuspec.dependencies_for(framework).to_vec(),
        }))
    }

    fn download(&self, identity: &PackageIdentity) -> Result<Vec<u8>> {
        let url = self.package_url(identity)?;
        self.get(&url)?
            .ok_or_else(|| Error::Download(format!("{} not found at {}", identity, url)))
    }
}
