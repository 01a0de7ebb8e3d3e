//! Discovery passes and persistence, end to end.

mod graph;
mod snapshots;
mod sweep;
mod translate;
mod walker;
