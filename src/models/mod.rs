//! Domain model module declarations.

pub mod classification;
pub mod event;
pub mod task;
