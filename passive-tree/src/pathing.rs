//! Shortest allocation paths and refund reachability over a loaded tree.
//!
//! Both queries are pure reads over `(&TreeGraph, &StateTracker)` and may be
//! called re-entrantly from controller operations; only the controller ever
//! mutates the tracker.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::TreeGraph;
use crate::node::Node;
use crate::state::{NodeStates, StateTracker};

/// Minimal set of additional nodes needed to connect `target` to the current
/// allocation, in allocation order (closest-to-root first, `target` last).
/// Empty when no constrained path exists or the target is already active.
///
/// Traversal rules: ascendancy subtrees are entered and left only through an
/// already-active node, inactive ascendancy-start and class-start nodes are
/// never walked through, and blighted nodes are trivially reachable. Ties are
/// broken only by FIFO frontier order, which follows adjacency-list order, so
/// results are deterministic for a fixed definition.
pub fn shortest_path(graph: &TreeGraph, state: &StateTracker, target: usize) -> Vec<usize> {
    if graph.node(target).is_blighted {
        return vec![target];
    }

    let skilled: HashSet<usize> = state
        .nodes_with_state(NodeStates::ACTIVE)
        .into_iter()
        .collect();
    if skilled.contains(&target) {
        return Vec::new();
    }

    // Frontier = one hop out from the active set.
    let mut frontier = VecDeque::new();
    let mut distance: HashMap<usize, usize> = HashMap::new();
    for adjacent in adjacent_nodes(graph, state, &skilled) {
        if adjacent == target {
            return vec![target];
        }
        let node = graph.node(adjacent);
        if node.is_ascendancy_start && !state.has_state(adjacent, NodeStates::ACTIVE) {
            continue;
        }
        frontier.push_back(adjacent);
        distance.insert(adjacent, 1);
    }

    let mut explored = skilled;
    let mut prev: HashMap<usize, usize> = HashMap::new();
    let mut reached = false;
    while let Some(current) = frontier.pop_front() {
        explored.insert(current);
        let dist = distance[&current];
        let current_node = graph.node(current);
        let current_active = state.has_state(current, NodeStates::ACTIVE);

        for &out in graph.out(current) {
            let out_node = graph.node(out);
            if crosses_locked_ascendancy_boundary(current_node, current_active, out_node, state, out)
            {
                continue;
            }
            if explored.contains(&out) || distance.contains_key(&out) {
                continue;
            }
            if out_node.is_ascendancy_start && !state.has_state(out, NodeStates::ACTIVE) {
                continue;
            }
            if out_node.is_class_start() && !state.has_state(out, NodeStates::ACTIVE) {
                continue;
            }

            distance.insert(out, dist + 1);
            prev.insert(out, current);
            frontier.push_back(out);
            if out == target {
                // BFS pops in non-decreasing distance order; nothing shorter
                // can still be found.
                reached = true;
                frontier.clear();
                break;
            }
        }
        if reached {
            break;
        }
    }

    if !distance.contains_key(&target) {
        return Vec::new();
    }

    let mut path = vec![target];
    let mut current = target;
    while let Some(&parent) = prev.get(&current) {
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

/// Currently-active nodes that would be orphaned from the active class start
/// if `source` were deallocated, in ascending index order. The source itself
/// is not part of the set (deselecting it is not a refund). Empty when no
/// class start is active: nothing is anchored, so nothing is refunded.
///
/// Reachability expands only through active nodes; two distinct ascendancies
/// are mutually opaque even when both are active, and two options under the
/// same multiple-choice parent are mutually exclusive.
pub fn refund_set(graph: &TreeGraph, state: &StateTracker, source: usize) -> Vec<usize> {
    let mut start = None;
    for (_, index) in graph.class_start_nodes() {
        if state.has_state(index, NodeStates::ACTIVE) {
            start = Some(index);
        }
    }
    let Some(start) = start else {
        return Vec::new();
    };

    let source_node = graph.node(source);
    let mut frontier: Vec<usize> = Vec::new();
    let mut reachable: HashSet<usize> = HashSet::new();
    for &out in graph.out(start) {
        if in_foreign_ascendancy(graph.node(out), source_node) {
            continue;
        }
        if state.has_state(out, NodeStates::ACTIVE) && out != source {
            frontier.push(out);
            reachable.insert(out);
        }
    }

    while !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for &current in &frontier {
            for &out in graph.out(current) {
                let out_node = graph.node(out);
                if out_node.is_multiple_choice_option
                    && source_node.is_multiple_choice_option
                    && graph.choice_parent(out).is_some()
                    && graph.choice_parent(out) == graph.choice_parent(source)
                {
                    continue;
                }
                if in_foreign_ascendancy(out_node, source_node) {
                    continue;
                }
                if out == source
                    || reachable.contains(&out)
                    || !state.has_state(out, NodeStates::ACTIVE)
                {
                    continue;
                }
                next_frontier.push(out);
                reachable.insert(out);
            }
        }
        frontier = next_frontier;
    }

    let mut refund: Vec<usize> = state
        .nodes_with_state(NodeStates::ACTIVE)
        .into_iter()
        .filter(|&index| {
            index != source && !reachable.contains(&index) && !graph.node(index).is_class_start()
        })
        .collect();
    refund.sort_unstable();
    refund
}

/// One hop out from the active set, deduplicated, in ascending source index
/// then adjacency-list order. Inactive class starts never join the frontier.
fn adjacent_nodes(graph: &TreeGraph, state: &StateTracker, skilled: &HashSet<usize>) -> Vec<usize> {
    let mut sources: Vec<usize> = skilled.iter().copied().collect();
    sources.sort_unstable();

    let mut seen = HashSet::new();
    let mut adjacent = Vec::new();
    for source in sources {
        for &out in graph.out(source) {
            let node = graph.node(out);
            if node.is_class_start() && !state.has_state(out, NodeStates::ACTIVE) {
                continue;
            }
            if seen.insert(out) {
                adjacent.push(out);
            }
        }
    }
    adjacent
}

/// An ascendancy subtree may only be entered through an active node, and only
/// left through an active node.
fn crosses_locked_ascendancy_boundary(
    current: &Node,
    current_active: bool,
    out: &Node,
    state: &StateTracker,
    out_index: usize,
) -> bool {
    (!current.in_ascendancy()
        && out.in_ascendancy()
        && !state.has_state(out_index, NodeStates::ACTIVE))
        || (current.in_ascendancy() && !out.in_ascendancy() && !current_active)
}

/// Distinct ascendancies are mutually opaque for refund reachability.
fn in_foreign_ascendancy(out: &Node, source: &Node) -> bool {
    out.in_ascendancy() && source.in_ascendancy() && out.ascendancy_name != source.ascendancy_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDef, TreeDef};

    fn node(id: &str, out: &[&str]) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            name: id.to_uppercase(),
            out: out.iter().map(|s| s.to_string()).collect(),
            ..NodeDef::default()
        }
    }

    fn start(id: &str, class_index: u32, out: &[&str]) -> NodeDef {
        NodeDef {
            class_start_index: Some(class_index),
            ..node(id, out)
        }
    }

    fn graph(nodes: Vec<NodeDef>) -> TreeGraph {
        TreeGraph::new(TreeDef {
            version: 1,
            nodes,
            ..TreeDef::default()
        })
        .expect("test tree")
    }

    fn activate(graph: &TreeGraph, state: &mut StateTracker, ids: &[&str]) {
        for id in ids {
            state.add_state(graph.index_of(id).unwrap(), NodeStates::ACTIVE);
        }
    }

    fn ids(graph: &TreeGraph, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| graph.node(i).id.clone()).collect()
    }

    /// S(start)-a-b-c-d path graph with only the start active.
    fn path_graph() -> TreeGraph {
        graph(vec![
            start("s", 0, &["a"]),
            node("a", &["b"]),
            node("b", &["c"]),
            node("c", &["d"]),
            node("d", &[]),
        ])
    }

    #[test]
    fn shortest_path_walks_out_from_the_active_set() {
        let g = path_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s"]);

        let path = shortest_path(&g, &state, g.index_of("c").unwrap());
        assert_eq!(ids(&g, &path), vec!["a", "b", "c"]);
    }

    #[test]
    fn shortest_path_is_empty_for_active_targets() {
        let g = path_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "a"]);

        assert!(shortest_path(&g, &state, g.index_of("a").unwrap()).is_empty());
    }

    #[test]
    fn shortest_path_short_circuits_for_adjacent_targets() {
        let g = path_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s"]);

        let path = shortest_path(&g, &state, g.index_of("a").unwrap());
        assert_eq!(ids(&g, &path), vec!["a"]);
    }

    #[test]
    fn shortest_path_is_empty_without_any_allocation() {
        let g = path_graph();
        let state = StateTracker::new();
        assert!(shortest_path(&g, &state, g.index_of("b").unwrap()).is_empty());
    }

    #[test]
    fn blighted_nodes_bypass_the_walk() {
        let mut blighted = node("x", &[]);
        blighted.is_blighted = true;
        let g = graph(vec![start("s", 0, &[]), blighted]);
        let state = StateTracker::new();

        let path = shortest_path(&g, &state, g.index_of("x").unwrap());
        assert_eq!(ids(&g, &path), vec!["x"]);
    }

    #[test]
    fn shortest_path_prefers_the_fewest_nodes() {
        // Two routes from s to goal: s-a-goal and s-b-c-goal.
        let g = graph(vec![
            start("s", 0, &["a", "b"]),
            node("a", &["goal"]),
            node("b", &["c"]),
            node("c", &["goal"]),
            node("goal", &[]),
        ]);
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s"]);

        let path = shortest_path(&g, &state, g.index_of("goal").unwrap());
        assert_eq!(ids(&g, &path), vec!["a", "goal"]);
    }

    #[test]
    fn shortest_path_does_not_walk_through_inactive_class_starts() {
        // Reaching "far" through the other class's start would be shorter.
        let g = graph(vec![
            start("s", 0, &["a"]),
            node("a", &["other"]),
            start("other", 1, &["far"]),
            node("far", &["x", "y"]),
            node("x", &["y"]),
            node("y", &[]),
        ]);
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "a"]);

        let path = shortest_path(&g, &state, g.index_of("far").unwrap());
        assert!(path.is_empty());
    }

    fn ascendancy_graph() -> TreeGraph {
        let mut asc_start = node("asc_start", &["asc_a"]);
        asc_start.is_ascendancy_start = true;
        asc_start.ascendancy_name = "Juggernaut".to_string();
        let mut asc_a = node("asc_a", &["asc_b"]);
        asc_a.ascendancy_name = "Juggernaut".to_string();
        let mut asc_b = node("asc_b", &[]);
        asc_b.ascendancy_name = "Juggernaut".to_string();

        graph(vec![
            start("s", 0, &["a"]),
            node("a", &["asc_start"]),
            asc_start,
            asc_a,
            asc_b,
        ])
    }

    #[test]
    fn ascendancy_is_opaque_until_its_start_is_active() {
        let g = ascendancy_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "a"]);

        assert!(shortest_path(&g, &state, g.index_of("asc_a").unwrap()).is_empty());

        activate(&g, &mut state, &["asc_start"]);
        let path = shortest_path(&g, &state, g.index_of("asc_b").unwrap());
        assert_eq!(ids(&g, &path), vec!["asc_a", "asc_b"]);
    }

    #[test]
    fn refund_of_a_cut_vertex_returns_exactly_the_cut_off_nodes() {
        let g = path_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "a", "b", "c"]);

        let refund = refund_set(&g, &state, g.index_of("a").unwrap());
        assert_eq!(ids(&g, &refund), vec!["b", "c"]);

        let refund = refund_set(&g, &state, g.index_of("b").unwrap());
        assert_eq!(ids(&g, &refund), vec!["c"]);
    }

    #[test]
    fn refund_of_a_leaf_orphans_nothing() {
        let g = path_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "a", "b", "c"]);

        assert!(refund_set(&g, &state, g.index_of("c").unwrap()).is_empty());
    }

    #[test]
    fn refund_is_empty_without_an_active_class_start() {
        let g = path_graph();
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["a", "b"]);

        assert!(refund_set(&g, &state, g.index_of("a").unwrap()).is_empty());
    }

    #[test]
    fn refund_keeps_nodes_reachable_around_a_cycle() {
        // s-a-b and s-c-b: refunding a must not orphan b.
        let g = graph(vec![
            start("s", 0, &["a", "c"]),
            node("a", &["b"]),
            node("b", &[]),
            node("c", &["b"]),
        ]);
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "a", "b", "c"]);

        assert!(refund_set(&g, &state, g.index_of("a").unwrap()).is_empty());
    }

    #[test]
    fn refund_treats_sibling_choice_options_as_exclusive() {
        // opt1 and opt2 are options of the same choice node. tail is active
        // and adjacent to opt2, but stepping onto a sibling option of the
        // refunded one is forbidden, so opt2 is orphaned anyway.
        let mut choice = node("choice", &["opt1", "opt2"]);
        choice.is_multiple_choice = true;
        let mut opt1 = node("opt1", &[]);
        opt1.is_multiple_choice_option = true;
        let mut opt2 = node("opt2", &[]);
        opt2.is_multiple_choice_option = true;

        let g = graph(vec![
            start("s", 0, &["opt1", "tail"]),
            choice,
            opt1,
            opt2,
            node("tail", &["opt2"]),
        ]);
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "opt1", "opt2", "tail"]);

        let refund = refund_set(&g, &state, g.index_of("opt1").unwrap());
        assert_eq!(ids(&g, &refund), vec!["opt2"]);

        // Without a shared parent the same shape keeps opt2 through tail.
        let mut plain_a = node("plain_a", &[]);
        plain_a.is_multiple_choice_option = false;
        let g = graph(vec![
            start("s", 0, &["plain_a", "tail"]),
            plain_a,
            node("plain_b", &[]),
            node("tail", &["plain_b"]),
        ]);
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "plain_a", "plain_b", "tail"]);

        assert!(refund_set(&g, &state, g.index_of("plain_a").unwrap()).is_empty());
    }

    #[test]
    fn refund_does_not_cross_into_an_unrelated_ascendancy() {
        let mut asc_a = node("asc_a", &[]);
        asc_a.ascendancy_name = "Juggernaut".to_string();
        asc_a.is_ascendancy_start = true;
        let mut asc_b = node("asc_b", &[]);
        asc_b.ascendancy_name = "Berserker".to_string();
        asc_b.is_ascendancy_start = true;

        let g = graph(vec![start("s", 0, &["asc_a", "asc_b", "a"]), asc_a, asc_b, node("a", &[])]);
        let mut state = StateTracker::new();
        activate(&g, &mut state, &["s", "asc_a", "asc_b", "a"]);

        // From asc_a's point of view, asc_b is opaque and therefore orphaned.
        let refund = refund_set(&g, &state, g.index_of("asc_a").unwrap());
        assert_eq!(ids(&g, &refund), vec!["asc_b"]);
    }
}
