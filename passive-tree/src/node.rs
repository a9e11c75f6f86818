use serde::{Deserialize, Serialize};

/// Static, data-authored tree definition. The engine treats it as immutable
/// after load; all mutable session state lives in a `StateTracker`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeDef {
    pub version: u32,
    pub kind: TreeKind,
    pub classes: Vec<ClassDef>,
    pub points: PointsDef,
    pub nodes: Vec<NodeDef>,
}

/// Which tree variant this definition describes. The atlas variant shares
/// hover highlighting between same-named mastery nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeKind {
    #[default]
    Character,
    Atlas,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassDef {
    pub name: String,
    pub ascendancies: Vec<AscendancyDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AscendancyDef {
    pub name: String,
}

/// Point pools granted by the game, before per-node grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointsDef {
    pub total_points: u32,
    pub ascendancy_points: u32,
}

/// One node as authored. `out` lists edge targets by id; edges are mirrored
/// into symmetric adjacency when the graph is built, so declaring either
/// direction is enough.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeDef {
    pub id: String,
    pub name: String,
    pub stats: Vec<String>,
    pub reminder: Vec<String>,
    pub icon: String,
    pub granted_passive_points: u32,
    /// Empty string = not part of any ascendancy subtree.
    pub ascendancy_name: String,
    /// Present only on the per-class starting nodes.
    pub class_start_index: Option<u32>,
    pub is_keystone: bool,
    pub is_notable: bool,
    pub is_mastery: bool,
    pub is_jewel_socket: bool,
    pub is_multiple_choice: bool,
    pub is_multiple_choice_option: bool,
    pub is_ascendancy_start: bool,
    pub is_blighted: bool,
    /// Alternate/jewel mechanics faction; 0 = none.
    pub faction: u32,
    pub out: Vec<String>,
}

/// Interned static node record. Indices into the graph replace id strings on
/// every hot path; the id is kept for the external surface.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub stats: Vec<String>,
    pub reminder: Vec<String>,
    pub icon: String,
    pub granted_passive_points: u32,
    pub ascendancy_name: String,
    pub class_start_index: Option<u32>,
    pub is_keystone: bool,
    pub is_notable: bool,
    pub is_mastery: bool,
    pub is_jewel_socket: bool,
    pub is_multiple_choice: bool,
    pub is_multiple_choice_option: bool,
    pub is_ascendancy_start: bool,
    pub is_blighted: bool,
    pub faction: u32,
}

impl Node {
    pub(crate) fn from_def(def: &NodeDef) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            stats: def.stats.clone(),
            reminder: def.reminder.clone(),
            icon: def.icon.clone(),
            granted_passive_points: def.granted_passive_points,
            ascendancy_name: def.ascendancy_name.clone(),
            class_start_index: def.class_start_index,
            is_keystone: def.is_keystone,
            is_notable: def.is_notable,
            is_mastery: def.is_mastery,
            is_jewel_socket: def.is_jewel_socket,
            is_multiple_choice: def.is_multiple_choice,
            is_multiple_choice_option: def.is_multiple_choice_option,
            is_ascendancy_start: def.is_ascendancy_start,
            is_blighted: def.is_blighted,
            faction: def.faction,
        }
    }

    pub fn is_class_start(&self) -> bool {
        self.class_start_index.is_some()
    }

    pub fn in_ascendancy(&self) -> bool {
        !self.ascendancy_name.is_empty()
    }
}
