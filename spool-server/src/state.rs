//! Shared application state

use crate::config::Config;
use crate::printer::PrinterLink;
use crate::queue::PrintQueue;
use std::sync::Arc;

/// State shared by the HTTP handlers
///
/// The queue is the only mutable resource shared between the HTTP context
/// and the worker; handlers only ever call `enqueue` and `snapshot` on it.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<PrintQueue>,
    pub link: Arc<PrinterLink>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(queue: Arc<PrintQueue>, link: Arc<PrinterLink>, config: Config) -> Self {
        Self {
            queue,
            link,
            config: Arc::new(config),
        }
    }
}
