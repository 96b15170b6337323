//! Collection modules and the registry that builds them.
//!
//! Every module implements [`CollectionModule`] and writes into its own
//! folder under the run's output root:
//!
//! ```text
//! Evidence_20240101_120000/
//! ├── collection_20240101_120000.log
//! ├── collection_20240101_120000.csv
//! ├── live_system/
//! ├── network/
//! ├── filesystem/
//! └── system_logs/
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use evidence_collector::collectors::ModuleRegistry;
//! use evidence_collector::config::ModuleSettings;
//!
//! let registry = ModuleRegistry::builtin();
//! let module = registry.create("live_system", &ModuleSettings::new())?;
//! println!("{}", module.get_module_info().name);
//! # Ok::<(), evidence_collector::error::CollectionError>(())
//! ```

/// Module lifecycle contract and run context
pub mod collector;

/// Shared state and hashing for built-in modules
pub mod artifacts;

/// Registration-time table of module constructors
pub mod registry;

/// Processes, memory, disks and host details
pub mod live_system;

/// Interfaces, ARP, routes and traffic capture
pub mod network;

/// Temp listings and recent files
pub mod filesystem;

/// Operating system log copies
pub mod system_logs;

pub use collector::{CollectionModule, ModuleContext};
pub use registry::{ModuleFactory, ModuleRegistry};

#[cfg(test)]
pub use collector::MockCollectionModule;
