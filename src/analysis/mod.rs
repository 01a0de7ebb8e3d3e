//! Discovery passes over a table source.
//!
//! `walker` expands known roots, `sweep` scores every page independently
//! of reachability, `graph` turns a designation map into a multigraph and
//! `translate` resolves virtual addresses through a recovered hierarchy.

pub mod graph;
pub mod sweep;
pub mod translate;
pub mod walker;

pub use graph::{GraphBuild, GraphBuilder, GraphEdge, OutOfBoundsEntry, PageNode, StructureGraph};
pub use sweep::{LevelCounts, PageScore, SweepClassifier, SweepReport};
pub use translate::{AddressTranslator, Translation};
pub use walker::{discover, RootWalker, WalkStats};
