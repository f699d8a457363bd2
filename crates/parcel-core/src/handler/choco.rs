//! Handler for the community package feed (`urn:choco:<id>:<version>`).

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parcel_schema::{PackageStatus, Urn};
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;

use super::{Handler, Listing, ensure_namespace, ensure_owned};
use crate::error::{Error, Result};
use crate::gate::HostEnvironment;
use crate::images::ImageDescriptor;
use crate::package::{ChocoDetails, Package, SourceDetails};

/// URN namespace owned by [`ChocoHandler`].
pub const NAMESPACE: &str = "choco";

const PACKAGES_URL: &str = "https://community.chocolatey.org/packages";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://community\.chocolatey\.org/packages/(?P<id>[^/\s?#]+)(?:/(?P<version>[\d.]+))?/?(?:[?#]|$)",
    )
    .expect("feed URL pattern is valid")
});

/// A package version as the feed describes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ChocoPackage {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(flatten)]
    pub details: ChocoDetails,
}

/// Community feed provider.
#[async_trait]
pub trait ChocoFeed: Send + Sync {
    async fn package(&self, id: &str, version: &str) -> Result<Option<ChocoPackage>>;

    async fn search(&self, query: &str) -> Result<Vec<ChocoPackage>>;
}

/// Handler for community feed packages.
pub struct ChocoHandler {
    feed: Arc<dyn ChocoFeed>,
}

impl ChocoHandler {
    /// Serve packages from `feed`.
    pub fn new(feed: Arc<dyn ChocoFeed>) -> Self {
        Self { feed }
    }

    fn to_package(package: ChocoPackage) -> Result<Package> {
        let urn = Urn::with_version(
            NAMESPACE,
            &package.details.package_id,
            &package.listing.version,
        )?;
        let has_location = package.details.download_url.is_some();

        let mut record = package
            .listing
            .into_package(urn, SourceDetails::Choco(package.details));
        record.advance(PackageStatus::None);
        if has_location {
            record.advance(PackageStatus::DownloadReady);
        }
        Ok(record)
    }
}

#[async_trait]
impl Handler for ChocoHandler {
    fn namespace(&self) -> &str {
        NAMESPACE
    }

    fn display_name(&self) -> &str {
        "Chocolatey"
    }

    async fn search(&self, query: &str) -> Result<Vec<Package>> {
        self.feed
            .search(query)
            .await?
            .into_iter()
            .map(Self::to_package)
            .collect()
    }

    async fn get_by_reference(&self, urn: &Urn) -> Result<Package> {
        ensure_namespace(self, urn)?;
        let (id, Some(version)) = urn.split_version() else {
            return Err(Error::VersionRequired(urn.to_string()));
        };
        let package = self
            .feed
            .package(id, version)
            .await?
            .ok_or_else(|| Error::NotFound(urn.to_string()))?;
        Self::to_package(package)
    }

    async fn get_by_url(&self, url: &Url) -> Result<Option<Package>> {
        let Some(captures) = URL_PATTERN.captures(url.as_str()) else {
            return Ok(None);
        };
        let id = &captures["id"];
        let urn = match captures.name("version") {
            Some(version) => Urn::with_version(NAMESPACE, id, version.as_str())?,
            None => Urn::new(NAMESPACE, id)?,
        };
        self.get_by_reference(&urn).await.map(Some)
    }

    fn url_for(&self, package: &Package) -> Result<Url> {
        ensure_owned(self, package)?;
        let SourceDetails::Choco(details) = package.details() else {
            return Err(Error::WrongNamespace {
                handler: NAMESPACE.to_string(),
                got: package.urn().to_string(),
            });
        };
        let mut url = format!("{PACKAGES_URL}/{}", details.package_id);
        if !package.version.is_empty() {
            url.push('/');
            url.push_str(&package.version);
        }
        Url::parse(&url).map_err(|e| Error::upstream(NAMESPACE, e))
    }

    fn representative_image(&self) -> ImageDescriptor {
        ImageDescriptor::text("Ch")
    }

    async fn resolve_download(&self, package: &mut Package, _host: &HostEnvironment) -> Result<()> {
        ensure_owned(self, package)?;
        if !package.has_download_location() {
            // The feed publishes the location with the metadata; refetch it.
            let fresh = self.get_by_reference(package.urn()).await?;
            let SourceDetails::Choco(fresh) = fresh.details() else {
                return Err(Error::NotFound(package.urn().to_string()));
            };
            let Some(location) = fresh.download_url.clone() else {
                return Err(Error::NotFound(format!("no download for {}", package.urn())));
            };
            if let SourceDetails::Choco(details) = package.details_mut() {
                details.download_url = Some(location);
                details.sha256.clone_from(&fresh.sha256);
            }
        }
        package.advance(PackageStatus::DownloadReady);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Feed;

    fn git(version: &str) -> ChocoPackage {
        ChocoPackage {
            listing: Listing {
                title: "Git".to_string(),
                version: version.to_string(),
                ..Listing::default()
            },
            details: ChocoDetails {
                package_id: "git".to_string(),
                download_url: Some(format!("https://dl.test/git-{version}.exe")),
                ..ChocoDetails::default()
            },
        }
    }

    #[async_trait]
    impl ChocoFeed for Feed {
        async fn package(&self, id: &str, version: &str) -> Result<Option<ChocoPackage>> {
            Ok((id == "git").then(|| git(version)))
        }

        async fn search(&self, _query: &str) -> Result<Vec<ChocoPackage>> {
            Ok(vec![git("2.45.1")])
        }
    }

    fn handler() -> ChocoHandler {
        ChocoHandler::new(Arc::new(Feed))
    }

    #[tokio::test]
    async fn test_reference_requires_version() {
        let urn = Urn::parse("urn:choco:git").unwrap();
        let err = handler().get_by_reference(&urn).await.unwrap_err();
        assert!(matches!(err, Error::VersionRequired(_)));
    }

    #[tokio::test]
    async fn test_get_by_reference_with_version() {
        let urn = Urn::parse("urn:choco:git:2.45.1").unwrap();
        let pkg = handler().get_by_reference(&urn).await.unwrap();
        assert_eq!(pkg.urn(), &urn);
        assert_eq!(pkg.version, "2.45.1");
        assert_eq!(pkg.status(), PackageStatus::DownloadReady);
    }

    #[tokio::test]
    async fn test_url_round_trip() {
        let h = handler();
        let url = Url::parse("https://community.chocolatey.org/packages/git/2.45.1").unwrap();
        let pkg = h.get_by_url(&url).await.unwrap().unwrap();
        assert_eq!(pkg.urn().to_string(), "urn:choco:git:2.45.1");
        assert_eq!(h.url_for(&pkg).unwrap(), url);
    }

    #[tokio::test]
    async fn test_url_without_version_requires_version() {
        let url = Url::parse("https://community.chocolatey.org/packages/git").unwrap();
        let err = handler().get_by_url(&url).await.unwrap_err();
        assert!(matches!(err, Error::VersionRequired(_)));
    }

    #[tokio::test]
    async fn test_foreign_url_is_not_claimed() {
        let url = Url::parse("https://apps.microsoft.com/detail/9NBLGGH4R315").unwrap();
        assert!(handler().get_by_url(&url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_feed_offers_no_suggestions() {
        assert!(handler().search_suggestions("gi").await.unwrap().is_empty());
    }
}
