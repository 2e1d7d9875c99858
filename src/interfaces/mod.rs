//! Boundary adapters that move fares in and out of the process.

pub mod csv;
