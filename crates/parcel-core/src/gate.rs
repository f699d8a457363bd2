//! Platform compatibility gate.
//!
//! A pure check of a package's declared constraints against the host. It
//! returns a human readable reason when the package cannot be installed and
//! `None` when nothing forbids it. Missing constraints are permissive.

use parcel_schema::{Arch, Platform};
use tracing::warn;

use crate::package::Package;

/// Environment variable overriding the detected platform family.
pub const PLATFORM_ENV: &str = "PARCEL_PLATFORM";
/// Environment variable overriding the detected architecture.
pub const ARCH_ENV: &str = "PARCEL_ARCH";

/// The machine packages are installed onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEnvironment {
    /// `None` when the platform family cannot be determined.
    pub platform: Option<Platform>,
    pub arch: Arch,
}

impl HostEnvironment {
    /// Describe a host explicitly.
    pub fn new(platform: Option<Platform>, arch: Arch) -> Self {
        Self { platform, arch }
    }

    /// Detect the host, honoring `PARCEL_PLATFORM` and `PARCEL_ARCH`.
    pub fn detect() -> Self {
        let platform = match std::env::var(PLATFORM_ENV) {
            Ok(value) => value.parse::<Platform>().map_or_else(
                |e| {
                    warn!("{PLATFORM_ENV}: {e}");
                    None
                },
                Some,
            ),
            Err(_) if cfg!(windows) => Some(Platform::Desktop),
            Err(_) => None,
        };
        let arch = match std::env::var(ARCH_ENV) {
            Ok(value) => value.parse::<Arch>().unwrap_or_else(|e| {
                warn!("{ARCH_ENV}: {e}");
                Arch::current()
            }),
            Err(_) => Arch::current(),
        };
        Self { platform, arch }
    }

    /// [`check`] against this host.
    pub fn check(&self, package: &Package) -> Option<String> {
        check(package, self.platform, self.arch)
    }
}

/// Why `package` cannot be installed on the given host, if anything.
pub fn check(package: &Package, platform: Option<Platform>, arch: Arch) -> Option<String> {
    let Some(platform) = platform else {
        return Some("Cannot identify the current platform.".to_string());
    };

    if let Some(allowed) = package.allowed_platforms() {
        if !allowed
            .iter()
            .any(|p| *p == platform || *p == Platform::Universal)
        {
            return Some(format!("{} does not support {platform}", package.title));
        }
    }

    if let Some(archs) = package.architectures() {
        if !archs.iter().any(|a| a.runs_on(arch)) {
            return Some(format!("{} does not support {arch}", package.title));
        }
    }

    None
}
