pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod handler;
pub mod images;
pub mod install;
pub mod io;
pub mod orchestrator;
pub mod package;
pub mod paths;

pub use catalog::StaticCatalog;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use events::{EventBus, EventFilter, EventKind, PackageEvent, PackageRef, Subscription};
pub use gate::HostEnvironment;
pub use handler::{ChocoHandler, Handler, MsStoreHandler, Registry, RegistryBuilder};
pub use install::{CommandPrimitive, InstallPrimitive};
pub use orchestrator::Orchestrator;
pub use package::{Artifact, Package, SourceDetails};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("parcel-core/", env!("CARGO_PKG_VERSION"));
