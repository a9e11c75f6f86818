use std::collections::HashMap;

use log::{debug, warn};

use crate::build::{BuildSnapshot, DecodedBuild};
use crate::error::TreeError;
use crate::graph::TreeGraph;
use crate::node::TreeKind;
use crate::pathing::{refund_set, shortest_path};
use crate::search::compile_pattern;
use crate::state::{NodeStates, StateTracker};

/// Notification fired after a controller operation; carries enough for the
/// renderer to re-draw and for the codec to re-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    ActiveNodesChanged,
    HighlightedNodesChanged,
    ClassChanged { node: String },
    AscendancyChanged,
    HoverStart { node: String },
    HoverEnd { node: String },
    PointsChanged(PointTotals),
}

/// Outbound notification sink, injected at construction. The controller never
/// calls out anywhere else.
pub trait EventSink {
    fn on_event(&mut self, event: &TreeEvent);
}

/// Sink that drops everything, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &TreeEvent) {}
}

/// Allocated-point bookkeeping. The normal maximum grows with the
/// passive-point grants of allocated nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointTotals {
    pub normal_allocated: u32,
    pub ascendancy_allocated: u32,
    pub normal_maximum: u32,
    pub ascendancy_maximum: u32,
}

/// One loaded tree plus its live session state. The graph is immutable after
/// load; everything that mutates during the session lives here, so the base
/// and compare trees are just two independent values.
#[derive(Debug)]
pub struct TreeSession {
    graph: TreeGraph,
    state: StateTracker,
    class_index: u32,
    ascendancy_index: u32,
    mastery_effects: HashMap<String, u32>,
    alternate_ids: HashMap<String, Vec<String>>,
}

impl TreeSession {
    pub fn new(graph: TreeGraph) -> Self {
        Self {
            graph,
            state: StateTracker::new(),
            class_index: 0,
            ascendancy_index: 0,
            mastery_effects: HashMap::new(),
            alternate_ids: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &TreeGraph {
        &self.graph
    }

    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    pub fn class_index(&self) -> u32 {
        self.class_index
    }

    /// 0 = no ascendancy selected; `1..=n` indexes the current class's
    /// ascendancy list.
    pub fn ascendancy_index(&self) -> u32 {
        self.ascendancy_index
    }

    /// Ids of the nodes holding every queried flag bit. Order is unspecified.
    pub fn nodes_with_state(&self, flags: NodeStates) -> Vec<&str> {
        self.state
            .nodes_with_state(flags)
            .into_iter()
            .map(|index| self.graph.node(index).id.as_str())
            .collect()
    }

    pub fn has_state(&self, id: &str, flags: NodeStates) -> Result<bool, TreeError> {
        let index = self.resolve(id)?;
        Ok(self.state.has_state(index, flags))
    }

    /// Path/refund length recorded by the last hover, for tooltip display.
    pub fn hover_text(&self, id: &str) -> Option<usize> {
        self.graph
            .index_of(id)
            .and_then(|index| self.state.hover_text(index))
    }

    pub fn mastery_effects(&self) -> &HashMap<String, u32> {
        &self.mastery_effects
    }

    pub fn alternate_ids(&self, id: &str) -> Option<&[String]> {
        self.alternate_ids.get(id).map(Vec::as_slice)
    }

    fn resolve(&self, id: &str) -> Result<usize, TreeError> {
        self.graph
            .index_of(id)
            .ok_or_else(|| TreeError::InvalidNodeReference(id.to_string()))
    }

    fn resolved_ascendancy_name(&self, ascendancy_index: u32) -> Option<&str> {
        if ascendancy_index == 0 {
            return None;
        }
        let class = self.graph.classes().get(self.class_index as usize)?;
        class
            .ascendancies
            .get(ascendancy_index as usize - 1)
            .map(|ascendancy| ascendancy.name.as_str())
    }

    /// Mastery selections die with deallocation.
    fn drop_stale_mastery_effects(&mut self) {
        let graph = &self.graph;
        let state = &self.state;
        self.mastery_effects.retain(|id, _| {
            graph
                .index_of(id)
                .is_some_and(|index| state.has_state(index, NodeStates::ACTIVE))
        });
    }
}

/// The state machine driving user actions into tracker mutations. Owns the
/// base tree, the optional compare tree, and the notification sink; nothing
/// else ever mutates a session.
pub struct Controller<S: EventSink> {
    base: TreeSession,
    compare: Option<TreeSession>,
    sink: S,
}

impl<S: EventSink> Controller<S> {
    pub fn new(base: TreeSession, compare: Option<TreeSession>, sink: S) -> Self {
        Self {
            base,
            compare,
            sink,
        }
    }

    pub fn base(&self) -> &TreeSession {
        &self.base
    }

    pub fn compare(&self) -> Option<&TreeSession> {
        self.compare.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Direct flag mutation for external collaborators (e.g. the compare
    /// differ setting `COMPARED`/`MOVED`). Allocation flows should go through
    /// [`Controller::click`] instead.
    pub fn add_state(&mut self, id: &str, flags: NodeStates) -> Result<(), TreeError> {
        let index = self.base.resolve(id)?;
        self.base.state.add_state(index, flags);
        Ok(())
    }

    pub fn remove_state(&mut self, id: &str, flags: NodeStates) -> Result<(), TreeError> {
        let index = self.base.resolve(id)?;
        self.base.state.remove_state(index, flags);
        Ok(())
    }

    pub fn clear_state(&mut self, flags: NodeStates) {
        self.base.state.clear_state(flags);
    }

    /// Override a node's default behavior with alternate-passive selections.
    pub fn set_alternate_ids(
        &mut self,
        id: &str,
        alternates: Vec<String>,
    ) -> Result<(), TreeError> {
        self.base.resolve(id)?;
        if alternates.is_empty() {
            self.base.alternate_ids.remove(id);
        } else {
            self.base.alternate_ids.insert(id.to_string(), alternates);
        }
        Ok(())
    }

    /// Record a mastery effect choice for an allocated mastery node.
    pub fn select_mastery_effect(&mut self, id: &str, effect: u32) -> Result<(), TreeError> {
        let index = self.base.resolve(id)?;
        if !self.base.state.has_state(index, NodeStates::ACTIVE) {
            return Err(TreeError::InconsistentBuild(format!(
                "mastery effect selected for unallocated node {id:?}"
            )));
        }
        self.base.mastery_effects.insert(id.to_string(), effect);
        Ok(())
    }

    /// Hover onto a node: mark it (or its compare counterpart) `HOVERED`,
    /// mark the would-be allocation path and refund set `PATHING`, and record
    /// the path/refund length for the tooltip. The refund count wins for
    /// display when both exist.
    pub fn hover_in(&mut self, id: &str) -> Result<(), TreeError> {
        let target = self.base.resolve(id)?;
        self.clear_hover_marks();

        let is_class_start = self.base.graph.node(target).is_class_start();
        if !is_class_start {
            if self.base.state.has_state(target, NodeStates::COMPARED) {
                if let Some(compare) = self.compare.as_mut() {
                    if let Some(index) = compare.graph.index_of(id) {
                        compare.state.add_state(index, NodeStates::HOVERED);
                    }
                }
            } else {
                self.base.state.add_state(target, NodeStates::HOVERED);
                if self.base.graph.kind() == TreeKind::Atlas
                    && self.base.graph.node(target).is_mastery
                {
                    self.hover_same_name_masteries(target);
                }
            }
        }

        let path = shortest_path(&self.base.graph, &self.base.state, target);
        for &index in &path {
            if index == target {
                continue;
            }
            if !self.base.state.has_state(index, NodeStates::ACTIVE) {
                self.base.state.add_state(index, NodeStates::PATHING);
            }
        }
        self.base.state.set_hover_text(target, path.len());

        if !path.is_empty() || self.base.state.has_state(target, NodeStates::ACTIVE) {
            let refund = refund_set(&self.base.graph, &self.base.state, target);
            for &index in &refund {
                self.base.state.add_state(index, NodeStates::PATHING);
            }
            if !refund.is_empty() {
                self.base.state.set_hover_text(target, refund.len());
            }
        }

        self.emit(TreeEvent::HoverStart {
            node: id.to_string(),
        });
        Ok(())
    }

    /// Hover off a node: drop all hover and pathing marks on both trees.
    pub fn hover_out(&mut self, id: &str) -> Result<(), TreeError> {
        self.base.resolve(id)?;
        self.clear_hover_marks();
        self.emit(TreeEvent::HoverEnd {
            node: id.to_string(),
        });
        Ok(())
    }

    /// Toggle allocation. A click on an active node is a pure deselect: the
    /// node and everything its removal orphans lose `ACTIVE` and nothing is
    /// granted (blighted nodes report a non-empty path even while active, so
    /// the grant is gated on the prior state, not on the path). Otherwise the
    /// shortest path is granted, with refunds applied first so a refunded
    /// node is never mistaken for newly granted. No-op for compared,
    /// class-start, and ascendancy-start nodes.
    pub fn click(&mut self, id: &str) -> Result<(), TreeError> {
        let target = self.base.resolve(id)?;
        {
            let node = self.base.graph.node(target);
            if self.base.state.has_state(target, NodeStates::COMPARED)
                || node.is_class_start()
                || node.is_ascendancy_start
            {
                return Ok(());
            }
        }

        let was_active = self.base.state.has_state(target, NodeStates::ACTIVE);
        let refund = refund_set(&self.base.graph, &self.base.state, target);
        let path = shortest_path(&self.base.graph, &self.base.state, target);

        if !path.is_empty() || was_active {
            for &index in &refund {
                if self.base.graph.node(index).is_class_start() {
                    continue;
                }
                self.base.state.remove_state(index, NodeStates::ACTIVE);
            }
            if was_active {
                // Clicking an allocated node deselects it along with its
                // orphans.
                self.base.state.remove_state(target, NodeStates::ACTIVE);
            }
        }

        if !was_active {
            for &index in &path {
                if !self.base.state.has_state(index, NodeStates::ACTIVE)
                    && !refund.contains(&index)
                {
                    self.base.state.add_state(index, NodeStates::ACTIVE);
                }
            }
        }

        self.base.drop_stale_mastery_effects();
        self.clear_hover_marks();
        self.notify_allocation_changed();
        Ok(())
    }

    /// Switch the character class: activate its start node, drop everything
    /// no longer anchored to it, and reset the ascendancy selection to none.
    pub fn change_start_class(&mut self, class_index: u32) {
        debug!("changing start class to {class_index}");

        let starts: Vec<(u32, usize)> = self.base.graph.class_start_nodes().collect();
        for &(start_index, index) in &starts {
            if start_index != class_index {
                self.base.state.remove_state(index, NodeStates::ACTIVE);
            }
        }
        for &(start_index, index) in &starts {
            if start_index != class_index {
                continue;
            }
            self.base.state.add_state(index, NodeStates::ACTIVE);
            let node = self.base.graph.node(index).id.clone();
            self.emit(TreeEvent::ClassChanged { node });

            // Switching classes invalidates anything unreachable from the
            // new start.
            let refund = refund_set(&self.base.graph, &self.base.state, index);
            for orphan in refund {
                self.base.state.remove_state(orphan, NodeStates::ACTIVE);
            }
        }

        self.base.class_index = class_index;
        self.apply_ascendancy(0);
        self.base.ascendancy_index = 0;
        self.base.drop_stale_mastery_effects();
        self.emit(TreeEvent::AscendancyChanged);
        self.notify_allocation_changed();
    }

    /// Select an ascendancy (0 = none): deallocate every foreign ascendancy
    /// node, then allocate the chosen ascendancy's start node only.
    pub fn change_ascendancy_class(&mut self, ascendancy_index: u32) {
        self.apply_ascendancy(ascendancy_index);
        self.base.drop_stale_mastery_effects();
        self.emit(TreeEvent::AscendancyChanged);
        self.notify_allocation_changed();
    }

    /// Highlight every non-start node whose name or stat text matches the
    /// pattern (case-insensitive); `None` clears all highlighting.
    pub fn search_change(&mut self, pattern: Option<&str>) {
        self.base.state.clear_state(NodeStates::HIGHLIGHTED);

        if let Some(pattern) = pattern.filter(|pattern| !pattern.is_empty()) {
            let matcher = compile_pattern(pattern);
            for index in 0..self.base.graph.len() {
                let node = self.base.graph.node(index);
                if node.is_ascendancy_start || node.is_class_start() {
                    continue;
                }
                if matcher.matches(&node.name)
                    || node.stats.iter().any(|stat| matcher.matches(stat))
                {
                    self.base.state.add_state(index, NodeStates::HIGHLIGHTED);
                }
            }
        }

        self.emit(TreeEvent::HighlightedNodesChanged);
    }

    /// Apply a decoded build from the codec collaborator. Any reference to a
    /// class, ascendancy, or node missing from this tree version resets the
    /// session to an empty-but-valid allocation and reports the failure;
    /// a partially-consistent allocation is never kept.
    pub fn apply_build(&mut self, build: &DecodedBuild) -> Result<(), TreeError> {
        debug!(
            "applying decoded build: class {}, ascendancy {}, {} nodes",
            build.class_index,
            build.ascendancy_index,
            build.allocated_node_ids.len() + build.extended_node_ids.len()
        );

        match self.try_apply_build(build) {
            Ok(()) => {
                self.notify_allocation_changed();
                Ok(())
            }
            Err(err) => {
                warn!("rejecting inconsistent build: {err}");
                self.reset_allocation();
                self.notify_allocation_changed();
                Err(err)
            }
        }
    }

    /// Re-encodable snapshot of the current allocation, derived purely from
    /// state. Class-start ids are implied by `class_index` and omitted.
    pub fn snapshot(&self) -> BuildSnapshot {
        let graph = &self.base.graph;
        let mut active = self.base.state.nodes_with_state(NodeStates::ACTIVE);
        active.sort_unstable();

        let allocated_node_ids = active
            .iter()
            .filter(|&&index| !graph.node(index).is_class_start())
            .map(|&index| graph.node(index).id.clone())
            .collect();
        let mastery_effect_selections = self
            .base
            .mastery_effects
            .iter()
            .filter(|(id, _)| {
                graph
                    .index_of(id)
                    .is_some_and(|index| self.base.state.has_state(index, NodeStates::ACTIVE))
            })
            .map(|(id, &effect)| (id.clone(), effect))
            .collect();

        BuildSnapshot {
            class_index: self.base.class_index,
            ascendancy_index: self.base.ascendancy_index,
            allocated_node_ids,
            mastery_effect_selections,
        }
    }

    /// Allocated normal/ascendancy node counts against their point pools.
    pub fn point_totals(&self) -> PointTotals {
        let graph = &self.base.graph;
        let mut totals = PointTotals {
            normal_maximum: graph.points().total_points,
            ascendancy_maximum: graph.points().ascendancy_points,
            ..PointTotals::default()
        };

        for index in self.base.state.nodes_with_state(NodeStates::ACTIVE) {
            let node = graph.node(index);
            if node.is_class_start() || node.is_ascendancy_start {
                continue;
            }
            if node.in_ascendancy() {
                totals.ascendancy_allocated += 1;
            } else {
                totals.normal_allocated += 1;
            }
            totals.normal_maximum += node.granted_passive_points;
        }
        totals
    }

    fn try_apply_build(&mut self, build: &DecodedBuild) -> Result<(), TreeError> {
        if self.base.graph.class_start(build.class_index).is_none() {
            return Err(TreeError::InconsistentBuild(format!(
                "class index {} has no start node",
                build.class_index
            )));
        }
        self.change_start_class(build.class_index);

        if build.ascendancy_index != 0
            && self
                .base
                .resolved_ascendancy_name(build.ascendancy_index)
                .is_none()
        {
            return Err(TreeError::InconsistentBuild(format!(
                "ascendancy index {} does not exist for class {}",
                build.ascendancy_index, build.class_index
            )));
        }
        self.apply_ascendancy(build.ascendancy_index);

        for id in build
            .allocated_node_ids
            .iter()
            .chain(&build.extended_node_ids)
        {
            let Some(index) = self.base.graph.index_of(id) else {
                return Err(TreeError::InconsistentBuild(format!(
                    "unknown node id {id:?}"
                )));
            };
            self.base.state.add_state(index, NodeStates::ACTIVE);
        }

        for (id, &effect) in &build.mastery_effect_selections {
            let Some(index) = self.base.graph.index_of(id) else {
                return Err(TreeError::InconsistentBuild(format!(
                    "unknown mastery node id {id:?}"
                )));
            };
            self.base.state.add_state(index, NodeStates::ACTIVE);
            self.base.mastery_effects.insert(id.clone(), effect);
        }

        // Defensive cleanup: a stale encode may reference nodes that are no
        // longer reachable from the start it names.
        let starts: Vec<usize> = self
            .base
            .graph
            .class_start_nodes()
            .map(|(_, index)| index)
            .collect();
        for start in starts {
            if !self.base.state.has_state(start, NodeStates::ACTIVE) {
                continue;
            }
            let refund = refund_set(&self.base.graph, &self.base.state, start);
            for orphan in refund {
                self.base.state.remove_state(orphan, NodeStates::ACTIVE);
            }
        }

        self.base.drop_stale_mastery_effects();
        Ok(())
    }

    /// Back to "current class start active, nothing else".
    fn reset_allocation(&mut self) {
        self.base.state.clear_all();
        self.base.mastery_effects.clear();
        self.base.ascendancy_index = 0;
        if let Some(start) = self.base.graph.class_start(self.base.class_index) {
            self.base.state.add_state(start, NodeStates::ACTIVE);
        }
    }

    fn apply_ascendancy(&mut self, ascendancy_index: u32) {
        let Some(class) = self
            .base
            .graph
            .classes()
            .get(self.base.class_index as usize)
        else {
            return;
        };
        if class.ascendancies.is_empty() {
            return;
        }
        let selected = self
            .base
            .resolved_ascendancy_name(ascendancy_index)
            .map(str::to_string);

        for index in self.base.graph.ascendancy_nodes().to_vec() {
            let node = self.base.graph.node(index);
            if selected.as_deref() != Some(node.ascendancy_name.as_str()) {
                self.base.state.remove_state(index, NodeStates::ACTIVE);
            } else if node.is_ascendancy_start {
                self.base.state.add_state(index, NodeStates::ACTIVE);
            }
        }
        self.base.ascendancy_index = ascendancy_index;
    }

    /// Mastery nodes of the same name share hover highlighting on the atlas
    /// tree.
    fn hover_same_name_masteries(&mut self, target: usize) {
        let name = self.base.graph.node(target).name.clone();
        for index in 0..self.base.graph.len() {
            if index == target {
                continue;
            }
            let node = self.base.graph.node(index);
            if node.is_mastery && node.name == name {
                self.base.state.add_state(index, NodeStates::HOVERED);
            }
        }
    }

    fn clear_hover_marks(&mut self) {
        self.base
            .state
            .clear_state(NodeStates::HOVERED | NodeStates::PATHING);
        self.base.state.clear_hover_text();
        if let Some(compare) = self.compare.as_mut() {
            compare
                .state
                .clear_state(NodeStates::HOVERED | NodeStates::PATHING);
        }
    }

    fn notify_allocation_changed(&mut self) {
        self.emit(TreeEvent::ActiveNodesChanged);
        let totals = self.point_totals();
        self.emit(TreeEvent::PointsChanged(totals));
    }

    fn emit(&mut self, event: TreeEvent) {
        self.sink.on_event(&event);
    }
}
