#![forbid(unsafe_code)]

//! taskbridge — convert chat requests into tracked board items and
//! reconcile thread deliverables back onto them.

pub mod classifier;
pub mod config;
pub mod errors;
pub mod identity;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod router;
pub mod slack;
pub mod tracker;
pub mod webhook;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
