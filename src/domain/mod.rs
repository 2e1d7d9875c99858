//! Domain types and the ports the application layer depends on.

pub mod fare;
pub mod organization;
pub mod ports;
