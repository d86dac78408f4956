// SPDX-License-Identifier: MPL-2.0

//! The ordering graph: one node per resolvent role, one merged edge per
//! ordered-before relationship, and a deterministic strongly-connected
//! component schedule over it.

use std::cmp::Reverse;
use std::fmt::{self, Display};
use std::hash::BuildHasherDefault;

use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

use crate::internal::{HashArena, Id};
use crate::resolvent::Resolvent;
use crate::type_aliases::{FxIndexMap, Set};

/// Which stage of a resolvent's job a node stands for. Fetching can be
/// scheduled earlier than the install it feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Role {
    Fetched,
    Done,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Fetched => "fetched",
            Role::Done => "done",
        })
    }
}

/// A node of the ordering graph. The derived `Ord` is the deterministic
/// tie-break order for scheduling.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NagIndex {
    pub(crate) resolvent: Resolvent,
    pub(crate) role: Role,
}

impl Display for NagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.resolvent, self.role)
    }
}

/// What kinds of dependency an edge carries. Parallel edges are merged:
/// kind flags and hardness accumulate, met-ness only survives if every
/// contributing dependency was met.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EdgeProperties {
    pub(crate) build: bool,
    pub(crate) run: bool,
    pub(crate) post: bool,
    pub(crate) build_all_met: bool,
    pub(crate) run_all_met: bool,
    /// Hard edges are never dropped when breaking cycles.
    pub(crate) hard: bool,
}

impl EdgeProperties {
    pub(crate) fn merge(&mut self, other: &EdgeProperties) {
        self.build |= other.build;
        self.run |= other.run;
        self.post |= other.post;
        self.build_all_met &= other.build_all_met;
        self.run_all_met &= other.run_all_met;
        self.hard |= other.hard;
    }
}

/// A directed graph whose edges point from a node that must be scheduled
/// earlier to one that must be scheduled later.
pub(crate) struct Nag {
    nodes: HashArena<NagIndex>,
    edges: FxIndexMap<Id<NagIndex>, FxIndexMap<Id<NagIndex>, EdgeProperties>>,
}

impl Nag {
    pub(crate) fn new() -> Self {
        Self {
            nodes: HashArena::new(),
            edges: FxIndexMap::default(),
        }
    }

    pub(crate) fn add_node(&mut self, index: NagIndex) -> Id<NagIndex> {
        self.nodes.alloc(index)
    }

    pub(crate) fn find_node(&self, index: &NagIndex) -> Option<Id<NagIndex>> {
        self.nodes.find(index)
    }

    pub(crate) fn node(&self, id: Id<NagIndex>) -> &NagIndex {
        &self.nodes[id]
    }

    pub(crate) fn add_edge(&mut self, from: Id<NagIndex>, to: Id<NagIndex>, props: EdgeProperties) {
        self.edges
            .entry(from)
            .or_default()
            .entry(to)
            .and_modify(|existing| existing.merge(&props))
            .or_insert(props);
    }

    pub(crate) fn edge(&self, from: Id<NagIndex>, to: Id<NagIndex>) -> Option<&EdgeProperties> {
        self.edges.get(&from)?.get(&to)
    }

    /// The strongly connected components of the subgraph induced by
    /// `keep` (all nodes when `None`) and by edges passing `edge_ok`,
    /// in topological order of the condensation. Among simultaneously
    /// schedulable components, the one whose smallest node sorts first
    /// goes first, so the result does not depend on insertion order.
    pub(crate) fn ordered_sccs(
        &self,
        keep: Option<&Set<Id<NagIndex>>>,
        edge_ok: impl Fn(&EdgeProperties) -> bool,
    ) -> Vec<Vec<Id<NagIndex>>> {
        let n = self.nodes.len();
        let ids: Vec<Id<NagIndex>> = self.nodes.iter().map(|(id, _)| id).collect();
        let active: Vec<bool> = ids
            .iter()
            .map(|id| keep.map_or(true, |k| k.contains(id)))
            .collect();

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (from, outgoing) in &self.edges {
            if !active[from.into_raw()] {
                continue;
            }
            for (to, props) in outgoing {
                if active[to.into_raw()] && edge_ok(props) {
                    successors[from.into_raw()].push(to.into_raw());
                }
            }
        }

        let sccs = tarjan(n, &successors, &active);

        // Kahn over the condensation, always taking the ready component
        // whose smallest member sorts first.
        let mut component_of = vec![usize::MAX; n];
        for (c, scc) in sccs.iter().enumerate() {
            for &v in scc {
                component_of[v] = c;
            }
        }
        let mut indegree = vec![0usize; sccs.len()];
        let mut condensed: Vec<Set<usize>> = vec![Set::default(); sccs.len()];
        for (v, targets) in successors.iter().enumerate() {
            for &w in targets {
                let (cv, cw) = (component_of[v], component_of[w]);
                if cv != cw && condensed[cv].insert(cw) {
                    indegree[cw] += 1;
                }
            }
        }

        let mut sorted_members: Vec<Vec<usize>> = sccs;
        for members in &mut sorted_members {
            members.sort_by(|a, b| self.nodes[ids[*a]].cmp(&self.nodes[ids[*b]]));
        }

        let mut ready: PriorityQueue<usize, Reverse<&NagIndex>, BuildHasherDefault<FxHasher>> =
            PriorityQueue::with_default_hasher();
        for (c, members) in sorted_members.iter().enumerate() {
            if indegree[c] == 0 {
                ready.push(c, Reverse(&self.nodes[ids[members[0]]]));
            }
        }
        let mut order = Vec::with_capacity(sorted_members.len());
        while let Some((c, _)) = ready.pop() {
            order.push(sorted_members[c].iter().map(|&v| ids[v]).collect());
            for &next in &condensed[c] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next, Reverse(&self.nodes[ids[sorted_members[next][0]]]));
                }
            }
        }
        order
    }
}

impl fmt::Debug for Nag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Nag");
        for (from, outgoing) in &self.edges {
            for to in outgoing.keys() {
                s.field("edge", &format!("{} -> {}", self.nodes[*from], self.nodes[*to]));
            }
        }
        s.finish()
    }
}

/// Iterative Tarjan, components returned in reverse topological order.
fn tarjan(n: usize, successors: &[Vec<usize>], active: &[bool]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0;
    let mut sccs = Vec::new();

    for start in 0..n {
        if !active[start] || index[start] != UNVISITED {
            continue;
        }
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        frames.push((start, 0));

        loop {
            let (v, child) = match frames.last_mut() {
                Some(frame) => {
                    let v = frame.0;
                    if frame.1 < successors[v].len() {
                        let w = successors[v][frame.1];
                        frame.1 += 1;
                        (v, Some(w))
                    } else {
                        (v, None)
                    }
                }
                None => break,
            };
            match child {
                Some(w) if index[w] == UNVISITED => {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                }
                Some(w) if on_stack[w] => {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                Some(_) => {}
                None => {
                    frames.pop();
                    if let Some(parent) = frames.last() {
                        lowlink[parent.0] = lowlink[parent.0].min(lowlink[v]);
                    }
                    if lowlink[v] == index[v] {
                        let mut scc = Vec::new();
                        while let Some(w) = stack.pop() {
                            on_stack[w] = false;
                            scc.push(w);
                            if w == v {
                                break;
                            }
                        }
                        sccs.push(scc);
                    }
                }
            }
        }
    }
    sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::PackageName;
    use crate::resolvent::DestinationType;

    fn node(name: &str, role: Role) -> NagIndex {
        NagIndex {
            resolvent: Resolvent::new(
                PackageName::new(name),
                None,
                DestinationType::InstallToSlash,
            ),
            role,
        }
    }

    fn soft_edge() -> EdgeProperties {
        EdgeProperties {
            build: true,
            run: false,
            post: false,
            build_all_met: false,
            run_all_met: true,
            hard: false,
        }
    }

    #[test]
    fn chain_orders_dependency_first() {
        let mut nag = Nag::new();
        let a = nag.add_node(node("cat/a", Role::Done));
        let b = nag.add_node(node("cat/b", Role::Done));
        let c = nag.add_node(node("cat/c", Role::Done));
        nag.add_edge(c, b, soft_edge());
        nag.add_edge(b, a, soft_edge());

        let order = nag.ordered_sccs(None, |_| true);
        assert_eq!(order, vec![vec![c], vec![b], vec![a]]);
    }

    #[test]
    fn independent_nodes_come_out_in_sorted_order() {
        let mut nag = Nag::new();
        let z = nag.add_node(node("cat/z", Role::Done));
        let a = nag.add_node(node("cat/a", Role::Done));
        let m = nag.add_node(node("cat/m", Role::Done));

        let order = nag.ordered_sccs(None, |_| true);
        assert_eq!(order, vec![vec![a], vec![m], vec![z]]);
    }

    #[test]
    fn cycle_collapses_into_one_component() {
        let mut nag = Nag::new();
        let a = nag.add_node(node("cat/a", Role::Done));
        let b = nag.add_node(node("cat/b", Role::Done));
        let c = nag.add_node(node("cat/c", Role::Done));
        nag.add_edge(a, b, soft_edge());
        nag.add_edge(b, a, soft_edge());
        nag.add_edge(b, c, soft_edge());

        let order = nag.ordered_sccs(None, |_| true);
        assert_eq!(order, vec![vec![a, b], vec![c]]);
    }

    #[test]
    fn edge_filter_breaks_the_cycle() {
        let mut nag = Nag::new();
        let a = nag.add_node(node("cat/a", Role::Done));
        let b = nag.add_node(node("cat/b", Role::Done));
        nag.add_edge(a, b, soft_edge());
        let mut back = soft_edge();
        back.post = true;
        nag.add_edge(b, a, back);

        let order = nag.ordered_sccs(None, |e| !e.post);
        assert_eq!(order, vec![vec![a], vec![b]]);
    }

    #[test]
    fn keep_set_restricts_the_subgraph() {
        let mut nag = Nag::new();
        let a = nag.add_node(node("cat/a", Role::Done));
        let b = nag.add_node(node("cat/b", Role::Done));
        let c = nag.add_node(node("cat/c", Role::Done));
        nag.add_edge(a, b, soft_edge());
        nag.add_edge(b, c, soft_edge());

        let mut keep = Set::default();
        keep.insert(a);
        keep.insert(c);
        let order = nag.ordered_sccs(Some(&keep), |_| true);
        assert_eq!(order, vec![vec![a], vec![c]]);
    }

    #[test]
    fn fetched_sorts_before_done_for_the_same_resolvent() {
        let mut nag = Nag::new();
        let done = nag.add_node(node("cat/a", Role::Done));
        let fetched = nag.add_node(node("cat/a", Role::Fetched));

        let order = nag.ordered_sccs(None, |_| true);
        assert_eq!(order, vec![vec![fetched], vec![done]]);
    }

    #[test]
    fn parallel_edges_merge_their_properties() {
        let mut nag = Nag::new();
        let a = nag.add_node(node("cat/a", Role::Done));
        let b = nag.add_node(node("cat/b", Role::Done));
        nag.add_edge(a, b, soft_edge());
        let mut second = soft_edge();
        second.build = false;
        second.run = true;
        second.run_all_met = false;
        second.hard = true;
        nag.add_edge(a, b, second);

        let merged = nag.edge(a, b).unwrap();
        assert!(merged.build && merged.run && merged.hard);
        assert!(!merged.build_all_met && !merged.run_all_met);
    }
}
