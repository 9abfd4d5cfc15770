//! Command handlers

pub mod asset;
pub mod config;
pub mod element;
pub mod maintenance;
pub mod page;
pub mod project;
pub mod status;

use invite_core::StoreError;

/// Message for a failed operation whose internals should stay in the log
///
/// Missing records and invalid input keep their own message; anything else
/// collapses into `fallback`.
pub fn user_facing(err: &anyhow::Error, fallback: &str) -> String {
    match err.downcast_ref::<StoreError>() {
        Some(store_err) => store_err.user_message(fallback),
        None => fallback.to_string(),
    }
}

/// Underlying cause of a failure, without transaction wrapping
pub fn underlying(err: &anyhow::Error) -> String {
    match err.downcast_ref::<StoreError>() {
        Some(store_err) => store_err.root_cause().to_string(),
        None => format!("{:#}", err),
    }
}
