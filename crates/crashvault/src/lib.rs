//! `crashvault` - Native crash capture and recovery pipeline
//!
//! This library installs process-level signal handlers through a native
//! runtime bridge, keeps crash metadata current on the native side, and
//! recovers, symbolicates, and delivers crash evidence persisted by a
//! previous process instance.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod report;
pub mod repository;
pub mod symbols;
pub mod worker;

pub use bridge::{InstallRequest, SignalBridge};
pub use config::Config;
pub use delivery::CrashDelivery;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use metadata::{MetadataSnapshot, MetadataStore};
pub use orchestrator::CrashOrchestrator;
pub use report::{CrashReportFile, NativeCrashRecord};
pub use repository::{CrashReportRepository, RepositoryStats, SortOrder};
pub use symbols::SymbolResolver;
