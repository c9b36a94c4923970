//! The reset network data structure.
//!
//! A [`ResetNet`] is the set of IR values (leaves of aggregates, addressed
//! by [`FieldRef`]) that are transitively connected through connect ops or
//! instance ports and must therefore carry the same concrete reset type.
//! While tracing a design there are many small transient nets for the
//! first connections to a wire or port; as more connections are seen, nets
//! are merged. A design only has a handful of resets, so the number of
//! surviving nets is expected to be low.

use firth_ir::{FieldRef, Type};
use firth_utils::{GPosIdx, IndexedMap, impl_idx};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) struct ResetNodeIdx(u32);
impl_idx!(ResetNodeIdx);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) struct ResetNetIdx(u32);
impl_idx!(ResetNetIdx);

/// The inferred kind of a reset net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum ResetKind {
    #[default]
    Uninferred,
    Async,
    Sync,
}

impl std::fmt::Display for ResetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetKind::Uninferred => write!(f, "<uninferred>"),
            ResetKind::Async => write!(f, "async"),
            ResetKind::Sync => write!(f, "sync"),
        }
    }
}

/// A single drive: `src` driven onto `dst`, with the position of the
/// connection for diagnostics.
#[derive(Debug, Clone, Copy)]
pub(super) struct ResetDrive {
    pub dst: ResetNodeIdx,
    pub src: ResetNodeIdx,
    pub pos: GPosIdx,
}

/// Per-leaf metadata, created the first time tracing observes a field.
#[derive(Debug, Clone)]
pub(super) struct ResetNode {
    pub field: FieldRef,
    /// The (leaf) type of the field at trace time.
    pub ty: Type,
    /// The net this node currently belongs to.
    pub net: Option<ResetNetIdx>,
}

/// An equivalence class of nodes.
#[derive(Debug, Clone, Default)]
pub(super) struct ResetNet {
    /// The member nodes. A node appears in exactly one live net, so the
    /// list is duplicate-free by construction.
    pub nodes: Vec<ResetNodeIdx>,
    /// The drives that contributed to this net.
    pub drives: Vec<ResetDrive>,
    pub kind: ResetKind,
}

/// A global view of all reset networks in a design.
///
/// The core entry point is [`add`](ResetMap::add), which records a drive
/// between two fields and unions the nets they belong to. Merging keeps
/// the larger net and migrates the smaller one into it; the abandoned net
/// goes onto a free list and is reused by later [`create_net`] calls.
/// Node back-pointers stay valid across a merge because only the losing
/// net's nodes are rewritten.
///
/// [`create_net`]: ResetMap::create_net
#[derive(Default)]
pub(super) struct ResetMap {
    nodes: IndexedMap<ResetNodeIdx, ResetNode>,
    node_index: HashMap<FieldRef, ResetNodeIdx>,
    nets: IndexedMap<ResetNetIdx, ResetNet>,
    /// The live nets, in creation order.
    live: Vec<ResetNetIdx>,
    /// Abandoned nets available for reuse.
    free: Vec<ResetNetIdx>,
}

impl ResetMap {
    /// Drop all state from the previous invocation.
    pub fn clear(&mut self) {
        *self = ResetMap::default();
    }

    pub fn node(&self, node: ResetNodeIdx) -> &ResetNode {
        &self.nodes[node]
    }

    pub fn net(&self, net: ResetNetIdx) -> &ResetNet {
        &self.nets[net]
    }

    pub fn net_mut(&mut self, net: ResetNetIdx) -> &mut ResetNet {
        &mut self.nets[net]
    }

    /// The live nets, in deterministic creation order.
    pub fn live_nets(&self) -> Vec<ResetNetIdx> {
        self.live.clone()
    }

    /// Record a drive of `src` onto `dst`, unioning the nets the two
    /// fields belong to.
    pub fn add(
        &mut self,
        dst: FieldRef,
        dst_ty: &Type,
        src: FieldRef,
        src_ty: &Type,
        pos: GPosIdx,
    ) {
        let dst_node = self.get_node(dst, dst_ty);
        let src_node = self.get_node(src, src_ty);

        let net = match (self.nodes[dst_node].net, self.nodes[src_node].net)
        {
            (None, None) => {
                // Neither side has been seen in a net; open a fresh one.
                let net = self.create_net();
                self.nodes[dst_node].net = Some(net);
                self.nets[net].nodes.push(dst_node);
                if src_node != dst_node {
                    self.nodes[src_node].net = Some(net);
                    self.nets[net].nodes.push(src_node);
                }
                net
            }
            (None, Some(net)) => {
                self.nodes[dst_node].net = Some(net);
                self.nets[net].nodes.push(dst_node);
                net
            }
            (Some(net), None) => {
                self.nodes[src_node].net = Some(net);
                self.nets[net].nodes.push(src_node);
                net
            }
            (Some(a), Some(b)) if a == b => a,
            (Some(a), Some(b)) => self.merge(a, b),
        };

        self.nets[net].drives.push(ResetDrive {
            dst: dst_node,
            src: src_node,
            pos,
        });
    }

    /// Fetch or create the node for a field.
    fn get_node(&mut self, field: FieldRef, ty: &Type) -> ResetNodeIdx {
        let nodes = &mut self.nodes;
        *self.node_index.entry(field).or_insert_with(|| {
            nodes.push(ResetNode {
                field,
                ty: ty.clone(),
                net: None,
            })
        })
    }

    /// Union two distinct nets, keeping the larger one. Returns the
    /// surviving net.
    fn merge(&mut self, a: ResetNetIdx, b: ResetNetIdx) -> ResetNetIdx {
        let (keep, lose) =
            if self.nets[a].nodes.len() < self.nets[b].nodes.len() {
                (b, a)
            } else {
                (a, b)
            };
        let moved_nodes = std::mem::take(&mut self.nets[lose].nodes);
        let moved_drives = std::mem::take(&mut self.nets[lose].drives);
        for &node in &moved_nodes {
            self.nodes[node].net = Some(keep);
        }
        self.nets[keep].nodes.extend(moved_nodes);
        self.nets[keep].drives.extend(moved_drives);
        self.abandon_net(lose);
        keep
    }

    fn create_net(&mut self) -> ResetNetIdx {
        let net = self
            .free
            .pop()
            .unwrap_or_else(|| self.nets.push(ResetNet::default()));
        self.live.push(net);
        net
    }

    /// Mark a net as available for reuse.
    fn abandon_net(&mut self, net: ResetNetIdx) {
        let data = &mut self.nets[net];
        data.nodes.clear();
        data.drives.clear();
        data.kind = ResetKind::Uninferred;
        self.live.retain(|&l| l != net);
        self.free.push(net);
    }

    /// Determine a good field for this net to report to the user. A net is
    /// a bag of values and drives and has no position per se; pick a node
    /// with the fewest incoming drives, which tends to sit at the top of
    /// the network.
    pub fn guess_root(&self, net: ResetNetIdx) -> FieldRef {
        let net = &self.nets[net];
        let mut counts: HashMap<ResetNodeIdx, usize> =
            net.nodes.iter().map(|&n| (n, 0)).collect();
        for drive in &net.drives {
            *counts.get_mut(&drive.dst).unwrap() += 1;
        }

        let mut lowest = None;
        let mut lowest_count = usize::MAX;
        for &node in &net.nodes {
            if counts[&node] < lowest_count {
                lowest_count = counts[&node];
                lowest = Some(node);
            }
        }
        self.nodes[lowest.expect("nets are never empty")].field
    }
}
