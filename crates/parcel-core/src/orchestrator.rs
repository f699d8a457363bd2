//! Download and install orchestration.
//!
//! The [`Orchestrator`] drives a record through its lifecycle:
//!
//! 1. **fetch**: ask the owning handler for a concrete download location.
//! 2. **download**: stream the installer, verify it, classify it and rename
//!    it with the matching extension.
//! 3. **compatibility**: run the gate, before the download when the record's
//!    metadata is enough, after it (with manifest architectures merged in)
//!    otherwise.
//! 4. **install**: hand the artifact to the [`InstallPrimitive`].
//!
//! Every step publishes a `*Started` event, then exactly one `*Completed` or
//! `*Failed` event, and returns the same outcome to the caller. A failed step
//! never advances the record's status.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parcel_schema::{InstallerType, PackageStatus};
use reqwest::Client;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::classify::{self, Classification};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventBus, EventError, PackageEvent, PackageRef};
use crate::gate::HostEnvironment;
use crate::handler::Registry;
use crate::install::{AppEntry, InstallPrimitive};
use crate::io::download::DownloadRequest;
use crate::package::{Artifact, Package};

/// One registration at a time, process-wide.
static INSTALL_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Drives packages through download, verification and installation.
pub struct Orchestrator {
    registry: Registry,
    bus: EventBus,
    primitive: Arc<dyn InstallPrimitive>,
    client: Client,
    host: HostEnvironment,
    download_dir: PathBuf,
    stall_timeout: Option<Duration>,
}

impl Orchestrator {
    /// An orchestrator with default settings for the current host.
    pub fn new(registry: Registry, bus: EventBus, primitive: Arc<dyn InstallPrimitive>) -> Self {
        Self {
            registry,
            bus,
            primitive,
            client: Client::new(),
            host: HostEnvironment::detect(),
            download_dir: std::env::temp_dir().join("parcel"),
            stall_timeout: None,
        }
    }

    /// Take download location and stall timeout from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.download_dir.clone_from(&config.download_dir);
        self.stall_timeout = config.stall_timeout;
        self
    }

    /// Check compatibility against `host` instead of the current machine.
    pub fn with_host(mut self, host: HostEnvironment) -> Self {
        self.host = host;
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Directory downloaded installers are stored under.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// `None` disables stall detection.
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Handlers this orchestrator resolves through.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Bus lifecycle events are published on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Host compatibility is checked against.
    pub fn host(&self) -> &HostEnvironment {
        &self.host
    }

    /// Resolve a download location for `package` if it has none yet.
    pub async fn fetch(&self, package: &mut Package, cancel: &CancellationToken) -> Result<()> {
        if package.has_download_location() {
            package.advance(PackageStatus::DownloadReady);
            return Ok(());
        }

        let subject = PackageRef::from(&*package);
        self.bus.publish(PackageEvent::FetchStarted {
            package: subject.clone(),
        });
        info!(urn = %subject.urn, "Resolving download location");

        let result = self.resolve_download(package, cancel).await;
        self.bus.publish(match &result {
            Ok(()) => PackageEvent::FetchCompleted { package: subject },
            Err(e) => PackageEvent::FetchFailed {
                package: subject,
                error: EventError::from(e),
            },
        });
        result
    }

    async fn resolve_download(
        &self,
        package: &mut Package,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let handler = Arc::clone(self.registry.handler_for(package)?);
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = handler.resolve_download(package, &self.host) => result?,
        }
        if !package.has_download_location() {
            return Err(Error::NotFound(format!(
                "no download location for {}",
                package.urn()
            )));
        }
        package.advance(PackageStatus::DownloadReady);
        Ok(())
    }

    /// Fetch if needed, then download, verify and classify the installer.
    pub async fn download(
        &self,
        package: &mut Package,
        cancel: &CancellationToken,
    ) -> Result<Artifact> {
        self.fetch(package, cancel).await?;

        let subject = PackageRef::from(&*package);
        self.bus.publish(PackageEvent::DownloadStarted {
            package: subject.clone(),
        });
        info!(urn = %subject.urn, "Downloading");

        let result = self.download_artifact(package, &subject, cancel).await;
        self.bus.publish(match &result {
            Ok(artifact) => PackageEvent::DownloadCompleted {
                package: subject,
                artifact: artifact.clone(),
            },
            Err(e) => PackageEvent::DownloadFailed {
                package: subject,
                error: EventError::from(e),
            },
        });
        result
    }

    async fn download_artifact(
        &self,
        package: &mut Package,
        subject: &PackageRef,
        cancel: &CancellationToken,
    ) -> Result<Artifact> {
        let url = package
            .download_url()
            .ok_or_else(|| Error::NotFound(format!("no download location for {}", subject.urn)))?
            .to_string();
        tokio::fs::create_dir_all(&self.download_dir).await?;

        // Every download gets its own directory so records never share a
        // file. Dropping it on any error removes the partial payload.
        let stem = package.artifact_stem();
        let slot = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .tempdir_in(&self.download_dir)?;
        let partial = slot.path().join(format!("{stem}.part"));
        let downloaded = DownloadRequest::new(&self.client, &url, &partial, cancel)
            .with_expected_hash(package.expected_sha256())
            .with_stall_timeout(self.stall_timeout)
            .execute(|received, total| {
                self.bus.publish(PackageEvent::DownloadProgress {
                    package: subject.clone(),
                    received,
                    total,
                });
            })
            .await?;

        let classification = self.classify_partial(&partial, cancel).await?;
        let installer_type = classification.kind;
        let path = slot
            .path()
            .join(format!("{stem}{}", installer_type.extension()));
        tokio::fs::rename(&partial, &path).await?;
        let _ = slot.keep();
        debug!(path = %path.display(), %installer_type, "Artifact stored");

        let artifact = Artifact {
            path,
            installer_type,
            type_inferred: classification.inferred,
            size: downloaded.size,
            sha256: downloaded.sha256,
        };
        if let Some(stale) = package.replace_artifact(artifact.clone()) {
            self.discard(&stale).await;
        }
        package.advance(PackageStatus::Downloaded);
        Ok(artifact)
    }

    /// Remove a replaced artifact and its download directory.
    async fn discard(&self, stale: &Artifact) {
        tokio::fs::remove_file(&stale.path).await.ok();
        if let Some(dir) = stale.path.parent().filter(|d| *d != self.download_dir) {
            tokio::fs::remove_dir(dir).await.ok();
        }
    }

    async fn classify_partial(
        &self,
        partial: &Path,
        cancel: &CancellationToken,
    ) -> Result<Classification> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        classify::inspect_file(partial).await
    }

    /// Download if needed, check compatibility, then register the installer
    /// with the OS.
    pub async fn install(&self, package: &mut Package, cancel: &CancellationToken) -> Result<()> {
        if !package.requires_download_for_compat_check() {
            if let Some(reason) = self.host.check(package) {
                return Err(self.reject(package, Error::IncompatiblePlatform(reason)));
            }
        }

        if !self.has_artifact_on_disk(package).await {
            self.download(package, cancel).await?;
        }

        let subject = PackageRef::from(&*package);
        self.bus.publish(PackageEvent::InstallStarted {
            package: subject.clone(),
        });

        let result = self.register(package, &subject, cancel).await;
        self.bus.publish(match &result {
            Ok(()) => PackageEvent::InstallCompleted { package: subject },
            Err(e) => PackageEvent::InstallFailed {
                package: subject,
                error: EventError::from(e),
            },
        });
        result
    }

    /// Report a failure that happened before the install step could start.
    fn reject(&self, package: &Package, err: Error) -> Error {
        let subject = PackageRef::from(package);
        info!(urn = %subject.urn, "{err}");
        self.bus.publish(PackageEvent::InstallStarted {
            package: subject.clone(),
        });
        self.bus.publish(PackageEvent::InstallFailed {
            package: subject,
            error: EventError::from(&err),
        });
        err
    }

    async fn has_artifact_on_disk(&self, package: &Package) -> bool {
        match package.artifact() {
            Some(artifact) => tokio::fs::try_exists(&artifact.path).await.unwrap_or(false),
            None => false,
        }
    }

    async fn register(
        &self,
        package: &mut Package,
        subject: &PackageRef,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let artifact = package
            .artifact()
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no artifact for {}", subject.urn)))?;

        if package.requires_download_for_compat_check() {
            self.merge_manifest_architectures(package, &artifact).await?;
            if let Some(reason) = self.host.check(package) {
                return Err(Error::IncompatiblePlatform(reason));
            }
        }

        let _guard = self.lock_installs(cancel).await?;
        info!(urn = %subject.urn, path = %artifact.path.display(), "Installing");

        let bus = self.bus.clone();
        let progress_subject = subject.clone();
        let progress = move |fraction: f64| {
            bus.publish(PackageEvent::InstallProgress {
                package: progress_subject.clone(),
                fraction: fraction.clamp(0.0, 1.0),
            });
        };

        let registration = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.primitive.register(&artifact.path, &progress) => result?,
        };
        if !registration.registered {
            return Err(Error::InstallRejected(
                registration
                    .error_text
                    .unwrap_or_else(|| "registration failed".to_string()),
            ));
        }

        package.advance(PackageStatus::Installed);
        info!(urn = %subject.urn, "Installed");
        Ok(())
    }

    async fn lock_installs(&self, cancel: &CancellationToken) -> Result<MutexGuard<'static, ()>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            guard = INSTALL_LOCK.lock() => Ok(guard),
        }
    }

    async fn merge_manifest_architectures(
        &self,
        package: &mut Package,
        artifact: &Artifact,
    ) -> Result<()> {
        let kind = artifact.installer_type;
        if kind.is_unknown() || kind.contains(InstallerType::ENCRYPTED) {
            debug!(%kind, "Installer manifest cannot be inspected");
            return Ok(());
        }
        let archs = if artifact.type_inferred {
            match classify::discover_architectures_of(&artifact.path).await? {
                Some(archs) => archs,
                None => {
                    debug!(%kind, "Guessed installer has no manifest, keeping declared constraints");
                    return Ok(());
                }
            }
        } else {
            classify::manifest_architectures_of(&artifact.path, kind.is_bundle()).await?
        };
        debug!(?archs, "Architectures from installer manifest");
        if !archs.is_empty() {
            package.set_architectures(archs);
        }
        Ok(())
    }

    /// Launch the first application of an installed package. Returns whether
    /// the launch command reported success.
    pub async fn launch(&self, package: &Package) -> Result<bool> {
        let app = self
            .find_app(package)
            .await?
            .ok_or_else(|| Error::NotInstalled(package.title.clone()))?;
        info!(urn = %package.urn(), app = %app.app_id, "Launching");
        self.primitive.launch(&app).await
    }

    /// Ask the OS whether the package is installed.
    pub async fn is_installed(&self, package: &Package) -> Result<bool> {
        Ok(self.find_app(package).await?.is_some())
    }

    async fn find_app(&self, package: &Package) -> Result<Option<AppEntry>> {
        match package.package_family_name() {
            Some(family) => self.primitive.find_app(family).await,
            None => Ok(None),
        }
    }
}
