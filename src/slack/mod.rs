//! Slack bridge layer modules.

pub mod gateway;
