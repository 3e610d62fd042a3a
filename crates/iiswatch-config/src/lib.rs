//! Configuration loading and resolution (spec §3 "Site Configuration", §6).
//!
//! [`loader`] reads the on-disk INI file (the ambient concern spec.md treats
//! as an external collaborator); [`app`] and [`site`] hold the resolved
//! structures the engine actually consumes.

pub mod app;
pub mod loader;
pub mod site;

pub use app::{AppSettings, DiscoveryMethod, SenderType};
pub use loader::{ConfigError, load_from_ini_file};
pub use site::{SiteConfig, SiteConfigOverrides, SiteConfigTable};
