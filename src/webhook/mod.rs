//! Inbound webhook layer: signature verification and the HTTP endpoint.

pub mod server;
pub mod signature;
