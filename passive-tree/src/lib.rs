//! Allocation and pathing engine for a passive-skill tree.
//!
//! The engine owns no rendering and performs no I/O: it loads an immutable
//! [`TreeGraph`] from a [`TreeDef`], tracks per-node state flags in a
//! [`StateTracker`] owned by each [`TreeSession`], and the [`Controller`]
//! sequences user actions (hover, click, class change, ascendancy change,
//! search) into flag mutations, firing [`TreeEvent`]s for the renderer and
//! producing [`BuildSnapshot`]s for the URL codec.

pub mod build;
pub mod controller;
pub mod error;
pub mod graph;
pub mod node;
pub mod pathing;
pub mod search;
pub mod state;

pub use build::{BuildSnapshot, DecodedBuild};
pub use controller::{Controller, EventSink, NullSink, PointTotals, TreeEvent, TreeSession};
pub use error::TreeError;
pub use graph::TreeGraph;
pub use node::{AscendancyDef, ClassDef, Node, NodeDef, PointsDef, TreeDef, TreeKind};
pub use pathing::{refund_set, shortest_path};
pub use search::{NodeMatcher, RegexMatcher, SubstringMatcher};
pub use state::{NodeStates, StateTracker};
