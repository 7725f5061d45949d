//! Opt-in process-wide container
//!
//! Applications that do not thread a [`Container`] through their
//! constructors can install one here with [`init_global`] and reach it with
//! [`with_global`]. Nothing in this crate uses it implicitly.

use std::sync::{Mutex, OnceLock, PoisonError};

use crate::container::{Container, ContainerOptions};
use crate::error::{Error, Result};

static GLOBAL: OnceLock<Mutex<Option<Container>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Container>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Install the process-wide container. Fails if one is installed already.
pub fn init_global(options: ContainerOptions) -> Result<()> {
    let mut global = slot().lock().unwrap_or_else(PoisonError::into_inner);
    if global.is_some() {
        return Err(Error::Global {
            message: "already initialized".to_string(),
        });
    }
    *global = Some(Container::new(options));
    tracing::debug!("global container initialized");
    Ok(())
}

/// Run `f` with exclusive access to the process-wide container.
pub fn with_global<R>(f: impl FnOnce(&mut Container) -> R) -> Result<R> {
    let mut global = slot().lock().unwrap_or_else(PoisonError::into_inner);
    match global.as_mut() {
        Some(container) => Ok(f(container)),
        None => Err(Error::Global {
            message: "not initialized".to_string(),
        }),
    }
}

/// Remove the process-wide container and hand it back.
pub fn teardown_global() -> Option<Container> {
    let container = slot().lock().unwrap_or_else(PoisonError::into_inner).take();
    if container.is_some() {
        tracing::debug!("global container torn down");
    }
    container
}

pub fn is_global_initialized() -> bool {
    slot().lock().unwrap_or_else(PoisonError::into_inner).is_some()
}
