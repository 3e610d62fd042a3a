//! The concurrent polling engine: Site Inventory, Discoverer, Probe Engine,
//! Checker, Sender, and Supervisor (spec §2–§5).

pub mod checker;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod latch;
pub mod probe;
pub mod sender;
pub mod state_query;
pub mod supervisor;

pub use checker::Checker;
pub use discovery::{Discoverer, NativeSiteQuery, NativeSiteSource, RawSiteRecord, ShellSiteSource, SiteSource};
pub use engine::{discover_once, start};
pub use error::SourceError;
pub use inventory::SiteInventory;
pub use latch::Latch;
pub use probe::{ProbeEngine, ProbeOutcome};
pub use sender::{ResultBatch, ResultItem, Sender, Sink};
pub use state_query::{NativeStateQuery, NativeStateSource, ShellStateSource, SiteStateSource};
pub use supervisor::{Supervisor, Worker};
