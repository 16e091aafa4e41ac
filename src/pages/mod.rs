// Page controllers
//
// Each page takes the mount point and the merged route parameters, queries
// the gateway synchronously, builds its elements and optionally hands back
// a cleanup for the router to run on the way out.

pub mod browse;
pub mod detail;
pub mod hysa;
pub mod not_found;

use crate::db::Database;
use crate::router::ErrorHook;
use crate::runtime::Host;
use std::rc::Rc;
use tracing::error;

/// What every page needs from the running app
#[derive(Clone)]
pub struct PageContext {
    pub host: Host,
    pub db: Rc<Database>,
    /// Failures raised by page events after the initial render
    pub on_error: ErrorHook,
}

impl PageContext {
    pub fn new(host: &Host, db: Rc<Database>) -> Self {
        Self {
            host: host.clone(),
            db,
            on_error: Rc::new(|err: &anyhow::Error| error!("unhandled page error: {:#}", err)),
        }
    }

    pub fn with_error_reporter(mut self, on_error: ErrorHook) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn report(&self, err: &anyhow::Error) {
        (self.on_error)(err);
    }
}
