//! Core domain types shared by the IIS Watch engine.
//!
//! - [`site`] — `Binding`, `Site`, and the preferred-binding selection rule
//! - [`probe`] — `ProbeStep` / `ProbePlan`, parsed from per-site JSON config
//! - [`status`] — `SiteState`, `ProbeStatus`, and the metric-key formatting
//! - [`message`] — the tagged-variant `Message` protocol between worker roles

pub mod message;
pub mod probe;
pub mod site;
pub mod status;

pub use message::{ClientId, Message};
pub use probe::{ProbePlan, ProbeStep};
pub use site::{Binding, Site};
pub use status::{probe_key, state_key, ProbeStatus, SiteState};
