//! Process-wide default hub
//!
//! Until [`install`] is called the default is an inert hub, so instrumented
//! code costs next to nothing. The [`GlobalHub`] guard returned by `install`
//! is the finalizer: dropping it shuts the default hub down.

use std::sync::{OnceLock, PoisonError, RwLock};

use super::config::HubConfig;
use super::instance::Hub;
use crate::domain::{HubError, InspectError};

static DEFAULT: RwLock<Option<Hub>> = RwLock::new(None);
static INERT: OnceLock<Hub> = OnceLock::new();

/// The current default hub
#[must_use]
pub fn hub() -> Hub {
    DEFAULT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_else(|| INERT.get_or_init(Hub::inert).clone())
}

/// Build a hub from `config` and make it the default
///
/// A previously installed default is shut down.
///
/// # Errors
/// Hub construction failure; the previous default stays in place.
pub fn install(config: HubConfig) -> Result<GlobalHub, HubError> {
    let hub = Hub::new(config)?;
    let previous = DEFAULT.write().unwrap_or_else(PoisonError::into_inner).replace(hub.clone());
    if let Some(previous) = previous {
        previous.shutdown();
    }
    Ok(GlobalHub { hub })
}

pub fn enable() {
    hub().enable();
}

pub fn disable() {
    hub().disable();
}

/// # Errors
/// Inspector failure.
pub fn take_snapshot() -> Result<(), InspectError> {
    hub().take_snapshot()
}

/// Guard owning the installed default hub
#[must_use = "dropping the guard shuts the default hub down"]
#[derive(Debug)]
pub struct GlobalHub {
    hub: Hub,
}

impl GlobalHub {
    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Shut down now (same as dropping the guard)
    pub fn finish(self) {}
}

impl Drop for GlobalHub {
    fn drop(&mut self) {
        {
            let mut current = DEFAULT.write().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|h| h.id() == self.hub.id()) {
                *current = None;
            }
        }
        self.hub.shutdown();
    }
}

/// Open a traced region on the default hub
///
/// ```ignore
/// let mut scope = chemtrails::chemtrails_trace!("load-config")?;
/// scope.user().insert("attempt".into(), 1.into());
/// scope.finish()?;
/// ```
///
/// Forms: `chemtrails_trace!()` (id from call site), `chemtrails_trace!(id)`,
/// `chemtrails_trace!(id, snapshot)`. The prefix keeps it clear of
/// `log::trace!` in modules that import both.
#[macro_export]
macro_rules! chemtrails_trace {
    () => {
        $crate::hub::global::hub().trace(None, false)
    };
    ($id:expr) => {
        $crate::hub::global::hub().trace(Some($crate::domain::TraceId::from($id)), false)
    };
    ($id:expr, snapshot) => {
        $crate::hub::global::hub().trace(Some($crate::domain::TraceId::from($id)), true)
    };
}
