//! StructureGraph: designated pages as an attributed directed multigraph.
//!
//! Nodes are page offsets, edges are `(source, target, absolute entry
//! offset)` triples for every present, in-bounds structural reference under
//! a recorded designation. References that leave the image are collected as
//! out-of-bounds anomalies instead of graph elements.

use crate::analysis::sweep::{LevelCounts, SweepReport};
use crate::config::GraphConfig;
use crate::core::designations::Designations;
use crate::core::process::{ProcessInfo, RootKind, RootSpec};
use crate::error::{PagehuntError, Result};
use crate::paging::{Level, Profile, TableSource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Process metadata attached to a top-level table node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessAnnotation {
    pub kind: RootKind,
    pub process: ProcessInfo,
}

/// Node attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub offset: u64,
    pub designations: BTreeSet<Level>,
    /// Data pages referenced by this page (when not materialised as nodes)
    pub data_pages: u32,
    pub in_degree: u32,
    pub out_degree: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<ProcessAnnotation>,
    /// Sweep counters, indexed by level position (candidate graphs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<Vec<LevelCounts>>,
}

impl PageNode {
    fn new(offset: u64) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Whether the page carries `level` as a designation.
    pub fn carries(&self, level: Level) -> bool {
        self.designations.contains(&level)
    }

    /// Per-level membership flags in level order.
    pub fn membership(&self) -> [bool; 4] {
        Level::ALL.map(|l| self.carries(l))
    }
}

/// A reference from one table to a deeper one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: u64,
    pub target: u64,
    /// Absolute physical offset of the referencing entry
    pub entry_offset: u64,
    /// Designation of `source` the edge was read under; `None` in candidate graphs
    pub level: Option<Level>,
}

/// A structural reference whose target lies outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfBoundsEntry {
    pub designation: Level,
    pub page_offset: u64,
    /// Offset of the entry within its page
    pub entry_offset: u64,
    pub target: u64,
    pub value: u64,
}

/// Directed multigraph over page offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureGraph {
    pub profile: Profile,
    pub image_size: u64,
    pub nodes: BTreeMap<u64, PageNode>,
    pub edges: Vec<GraphEdge>,
}

impl StructureGraph {
    fn new(profile: Profile, image_size: u64) -> Self {
        Self {
            profile,
            image_size,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, offset: u64) -> Option<&PageNode> {
        self.nodes.get(&offset)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges_from(&self, offset: u64) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.iter().filter(move |e| e.source == offset)
    }

    fn node_mut(&mut self, offset: u64) -> &mut PageNode {
        self.nodes
            .entry(offset)
            .or_insert_with(|| PageNode::new(offset))
    }

    fn add_edge(&mut self, edge: GraphEdge) {
        self.node_mut(edge.source);
        self.node_mut(edge.target);
        self.edges.push(edge);
    }

    fn recompute_degrees(&mut self) {
        for node in self.nodes.values_mut() {
            node.in_degree = 0;
            node.out_degree = 0;
        }
        for edge in &self.edges {
            if let Some(n) = self.nodes.get_mut(&edge.source) {
                n.out_degree += 1;
            }
            if let Some(n) = self.nodes.get_mut(&edge.target) {
                n.in_degree += 1;
            }
        }
    }

    /// Attach process metadata to the nodes of their top-level tables.
    ///
    /// Returns how many roots matched a node.
    pub fn annotate_processes(&mut self, roots: &[RootSpec]) -> usize {
        let mut matched = 0;
        for root in roots {
            let Some(process) = &root.process else { continue };
            match self.nodes.get_mut(&root.address) {
                Some(node) => {
                    node.processes.push(ProcessAnnotation {
                        kind: root.kind,
                        process: process.clone(),
                    });
                    matched += 1;
                }
                None => debug!(
                    root = %format_args!("{:#x}", root.address),
                    pid = process.pid,
                    "Root has no node in graph"
                ),
            }
        }
        matched
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PagehuntError::Serialization(format!("JSON serialization error: {}", e)))
    }

    pub fn from_json_str(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| PagehuntError::Serialization(format!("JSON deserialization error: {}", e)))
    }
}

/// Graph plus the anomalies found while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphBuild {
    pub graph: StructureGraph,
    pub out_of_bounds: Vec<OutOfBoundsEntry>,
    /// Designated pages that could not be read as a table
    pub unreadable_pages: usize,
}

/// Builds structure graphs from a designation map and a table source.
pub struct GraphBuilder<'a, S: TableSource + ?Sized> {
    source: &'a S,
    profile: Profile,
    config: GraphConfig,
}

impl<'a, S: TableSource + ?Sized> GraphBuilder<'a, S> {
    pub fn new(source: &'a S, profile: Profile) -> Self {
        Self::with_config(source, profile, GraphConfig::default())
    }

    pub fn with_config(source: &'a S, profile: Profile, config: GraphConfig) -> Self {
        Self {
            source,
            profile,
            config,
        }
    }

    /// Build the graph of all designated pages.
    pub fn build(&self, designations: &Designations) -> GraphBuild {
        let size = self.source.image_size();
        let mut graph = StructureGraph::new(self.profile, size);
        let mut out_of_bounds = Vec::new();
        let mut unreadable_pages = 0;

        info!(
            pages = designations.len(),
            data_page_nodes = self.config.data_page_nodes,
            "Building structure graph"
        );

        // Pages without edges (e.g. empty top-level tables) still become nodes.
        for (offset, levels) in designations.iter() {
            if !levels.is_empty() {
                graph.node_mut(offset).designations = levels.clone();
            }
        }

        for (page_offset, levels) in designations.iter() {
            if levels.is_empty() {
                continue;
            }
            let table = match self.source.table(self.profile, page_offset) {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        page = %format_args!("{:#x}", page_offset),
                        error = %e,
                        "Skipping unreadable designated page"
                    );
                    unreadable_pages += 1;
                    continue;
                }
            };

            for &designation in levels {
                for (entry_offset, entry) in table.present_entries() {
                    let target = entry.target();
                    let in_image = target < size;
                    let edge = GraphEdge {
                        source: page_offset,
                        target,
                        entry_offset: page_offset + entry_offset,
                        level: Some(designation),
                    };
                    if entry.target_is_data(designation) {
                        match (self.config.data_page_nodes, in_image) {
                            (false, _) => graph.node_mut(page_offset).data_pages += 1,
                            (true, true) => graph.add_edge(edge),
                            // Data outside the image, e.g. device memory.
                            (true, false) => {}
                        }
                    } else if in_image {
                        graph.add_edge(edge);
                    } else {
                        out_of_bounds.push(OutOfBoundsEntry {
                            designation,
                            page_offset,
                            entry_offset,
                            target,
                            value: entry.value(),
                        });
                    }
                }
            }
        }

        graph.recompute_degrees();
        if !out_of_bounds.is_empty() {
            info!(count = out_of_bounds.len(), "Found out-of-bounds entries");
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Structure graph built"
        );

        GraphBuild {
            graph,
            out_of_bounds,
            unreadable_pages,
        }
    }

    /// Level-agnostic graph over every swept page.
    ///
    /// Each present entry with an in-image target becomes an edge; nodes
    /// carry the sweep counters of their page.
    pub fn build_candidate_graph(&self, report: &SweepReport) -> StructureGraph {
        let size = self.source.image_size();
        let mut graph = StructureGraph::new(self.profile, size);
        info!(pages = report.pages.len(), "Building candidate graph");

        for score in &report.pages {
            graph.node_mut(score.offset).sweep = Some(score.counts.clone());
        }
        for score in &report.pages {
            let table = match self.source.table(self.profile, score.offset) {
                Ok(t) => t,
                Err(e) => {
                    warn!(page = %format_args!("{:#x}", score.offset), error = %e, "Skipping page");
                    continue;
                }
            };
            for (entry_offset, entry) in table.present_entries() {
                if entry.target() < size {
                    graph.add_edge(GraphEdge {
                        source: score.offset,
                        target: entry.target(),
                        entry_offset: score.offset + entry_offset,
                        level: None,
                    });
                }
            }
        }
        graph.recompute_degrees();
        graph
    }
}

/// Physical pages referenced as data under any designation.
pub fn mapped_pages<S: TableSource + ?Sized>(
    source: &S,
    profile: Profile,
    designations: &Designations,
) -> BTreeSet<u64> {
    let mut mapped = BTreeSet::new();
    for (offset, levels) in designations.iter() {
        if levels.is_empty() {
            continue;
        }
        let Ok(table) = source.table(profile, offset) else {
            continue;
        };
        for (_, entry) in table.present_entries() {
            if levels.iter().any(|l| entry.target_is_data(*l)) {
                mapped.insert(entry.target());
            }
        }
    }
    mapped
}
