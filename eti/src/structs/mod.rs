//! Data structures representing ETI(NI) frame components.
//!
//! Covers the fixed frame fields (SYNC, FC, STC, EOH) and the Fast
//! Information Channel down to the individual FIGs.

pub mod fib;
pub mod fig;
pub mod header;
pub mod sync;
