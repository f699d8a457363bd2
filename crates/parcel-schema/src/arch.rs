//! Processor architecture and platform family identifiers.
//!
//! Store catalogs and installer manifests both name architectures
//! (`x64`, `arm64`, `neutral`, ...) and device families (`Windows.Desktop`,
//! `Windows.Xbox`, ...). These enums are the shared vocabulary the
//! compatibility gate compares against the host.
//!
//! # Example
//!
//! ```
//! use parcel_schema::{Arch, Platform};
//!
//! let arch: Arch = "AMD64".parse().unwrap();
//! assert_eq!(arch, Arch::X64);
//!
//! let platform: Platform = "Windows.Desktop".parse().unwrap();
//! assert_eq!(platform, Platform::Desktop);
//! ```

/// Processor architecture of a package or of the host.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 32-bit x86.
    X86,
    /// 64-bit x86 (`x86_64` / `amd64`).
    #[default]
    X64,
    /// 32-bit ARM.
    Arm,
    /// 64-bit ARM (`aarch64`).
    Arm64,
    /// Architecture independent; runs on every host.
    Neutral,
}

impl Arch {
    /// Get the architecture this binary was compiled for.
    pub fn current() -> Self {
        #[cfg(target_arch = "aarch64")]
        {
            Self::Arm64
        }
        #[cfg(target_arch = "arm")]
        {
            Self::Arm
        }
        #[cfg(target_arch = "x86")]
        {
            Self::X86
        }
        #[cfg(not(any(target_arch = "aarch64", target_arch = "arm", target_arch = "x86")))]
        {
            Self::X64
        }
    }

    /// Convert to the manifest spelling (`x64`, `arm64`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::Neutral => "neutral",
        }
    }

    /// Whether a package built for `self` can run on a `host`.
    pub fn runs_on(&self, host: Self) -> bool {
        *self == Self::Neutral || *self == host
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" | "i386" | "i686" => Ok(Self::X86),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            "arm" => Ok(Self::Arm),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "neutral" => Ok(Self::Neutral),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// Device family a package may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Desktop PCs.
    Desktop,
    /// Phones.
    Mobile,
    /// Game consoles.
    Xbox,
    /// Mixed-reality headsets.
    Holographic,
    /// Large collaboration displays.
    Team,
    /// Embedded / `IoT` devices.
    Iot,
    /// Any device family.
    Universal,
}

impl Platform {
    /// Convert to the catalog spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Xbox => "xbox",
            Self::Holographic => "holographic",
            Self::Team => "team",
            Self::Iot => "iot",
            Self::Universal => "universal",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    /// Accepts both bare names (`desktop`) and device family strings
    /// (`Windows.Desktop`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let name = lower.strip_prefix("windows.").unwrap_or(&lower);
        match name {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            "xbox" => Ok(Self::Xbox),
            "holographic" => Ok(Self::Holographic),
            "team" => Ok(Self::Team),
            "iot" => Ok(Self::Iot),
            "universal" => Ok(Self::Universal),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}
