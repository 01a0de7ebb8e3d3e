//! Core data types shared by the discovery passes.

pub mod designations;
pub mod process;

pub use designations::{DesignationSummary, Designations};
pub use process::{ProcessInfo, RootKind, RootSpec, TaskInfo};
