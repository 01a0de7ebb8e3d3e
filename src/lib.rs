//! Recovery of page-table hierarchies from raw physical memory snapshots.
//!
//! A memory image is read through [`io::MemoryView`]; [`paging::Profile`]
//! decodes its 8-byte cells. Tables reachable from known top-level tables
//! are found by [`analysis::RootWalker`], every page is scored by
//! [`analysis::SweepClassifier`], and a designation map becomes a
//! multigraph through [`analysis::GraphBuilder`]. Designation maps persist
//! as [`snapshot::LightSnapshot`] files.

pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod hashing;
pub mod io;
pub mod logging;
pub mod paging;
pub mod snapshot;

pub use crate::config::ScanConfig;
pub use crate::core::{Designations, RootSpec};
pub use crate::error::{PagehuntError, Result};
pub use crate::paging::{Level, PagingEntry, Profile};
