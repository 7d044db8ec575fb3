//! Case map library
//!
//! Binds per-date case counts onto map regions and facilities, colours them
//! through threshold buckets and keeps hover highlights and date requests
//! consistent while snapshots are swapped underneath.
//!
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
