//! Shared application state passed to every request handler.

use crate::lifecycle::Controller;

/// Immutable for the life of the server; all mutable state lives on disk.
pub struct AppState {
    pub controller: Controller,
    pub version: &'static str,
}
