//! Runtime layer of paramtree
//!
//! This crate turns loaded config data into values inside the running
//! program:
//!
//! - **Registration**: sections declare typed parameters bound to [`Param`]
//!   slots, through a [`RegistrationBackend`]
//! - **Loading**: includes, search paths and config mappings, filtered by
//!   the container's facts
//! - **Resolution**: command line, developer overrides, references,
//!   inheritance, deprecated names and defaults, demand-driven with cycle
//!   detection
//! - **Refresh**: every problem collected into one [`RefreshResult`]
//! - **Saving**: the loaded files rewritten with minimal churn by [`Saver`]
//!
//! # Architecture
//!
//! ```text
//!                 paramtree-cli
//!                       |
//!                paramtree-core
//!                       |
//!        +--------------+--------------+
//!        |              |              |
//!  paramtree-fs  paramtree-meta  paramtree-formats
//! ```
//!
//! # Example
//!
//! ```ignore
//! use paramtree_core::{Container, ConfigSection, Param, ParamSpec, Registrar};
//!
//! #[derive(Default)]
//! struct Ports {
//!     cmd: Param<i32>,
//! }
//!
//! impl ConfigSection for Ports {
//!     fn declare(&self, reg: &mut Registrar<'_>) {
//!         reg.add(ParamSpec::new("cmd", &self.cmd).cmdline("cmd_port"));
//!     }
//! }
//!
//! let ports = Ports::default();
//! let mut container = Container::default();
//! container.load("ports")?;
//! container.register("ports", &ports)?;
//! container.refresh()?;
//! ```

pub mod backend;
pub mod container;
pub mod error;
pub mod global;
pub mod saver;
pub mod section;
pub mod slot;
pub mod subconfig;
pub mod value;

pub use backend::{LegacyBackend, NamespacedBackend, RegistrationBackend};
pub use container::{
    CheckingMode, Cmdline, Container, ContainerOptions, RefreshResult, ResolvedData, ResolvedValue,
};
pub use error::{Error, Result};
pub use global::{init_global, is_global_initialized, teardown_global, with_global};
pub use saver::{
    SaveMode, SaveOptions, SaveOrder, SaveTarget, SaveValueMode, Saver, UnknownParameterPolicy,
};
pub use section::{ConfigSection, ParamSpec, Registrar};
pub use slot::{Param, Slot, WeakSlot};
pub use subconfig::SubconfigMap;
pub use value::ParamValue;
