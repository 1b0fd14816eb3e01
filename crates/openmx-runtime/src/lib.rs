//! OpenMX Runtime
//!
//! Binds the management engine to a simulated VM:
//! - **Config**: `openmx.toml` parsing and validation (`config` module)
//! - **Sim**: a deterministic VM implementing every backend trait (`sim` module)
//! - **Runtime**: the VM plus the platform built over it (`runtime` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use openmx_runtime::{Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::new(RuntimeConfig::default())?;
//! runtime.vm().heap().allocate(64 * 1024 * 1024)?;
//! let heap = runtime.platform().memory().heap_memory_usage()?;
//! runtime.shutdown();
//! ```

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod runtime;
pub mod sim;

pub use config::{RuntimeConfig, SimulationConfig, VERBOSE_ENV};
pub use error::{ConfigError, RuntimeError};
pub use runtime::Runtime;
pub use sim::SimulatedVm;
