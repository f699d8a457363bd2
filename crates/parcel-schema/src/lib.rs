//! Shared identifiers and classification types for parcel.
//!
//! This crate has no I/O. It holds the vocabulary every other crate speaks:
//! package references ([`Urn`]), host descriptors ([`Arch`], [`Platform`]),
//! installer payload flags ([`InstallerType`]) and the lifecycle status
//! ([`PackageStatus`]).

pub mod arch;
pub mod installer;
pub mod status;
pub mod urn;

// Re-exports
pub use arch::*;
pub use installer::InstallerType;
pub use status::PackageStatus;
pub use urn::{Urn, UrnError};

/// Big-endian magic number of a local zip file header (`PK\x03\x04`).
pub const ZIP_MAGIC: u32 = 0x504B_0304;

/// Big-endian magic number of an encrypted installer bundle (`EXBH`).
pub const ENCRYPTED_BUNDLE_MAGIC: u32 = 0x4558_4248;
