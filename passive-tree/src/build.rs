//! Boundary types for the URL codec collaborator. The bit-packed format
//! itself lives outside this crate; the engine only consumes the decoded
//! shape and produces a re-encodable snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A build as decoded from a shared URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodedBuild {
    pub version: u32,
    pub class_index: u32,
    /// 0 = no ascendancy; `1..=n` indexes the class's ascendancy list.
    pub ascendancy_index: u32,
    pub allocated_node_ids: Vec<String>,
    pub extended_node_ids: Vec<String>,
    pub mastery_effect_selections: BTreeMap<String, u32>,
}

/// Snapshot derived purely from current session state, produced after every
/// mutating operation for re-encoding. Class-start node ids are implied by
/// `class_index` and omitted; node ids come out in stable registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSnapshot {
    pub class_index: u32,
    pub ascendancy_index: u32,
    pub allocated_node_ids: Vec<String>,
    pub mastery_effect_selections: BTreeMap<String, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoded_build_deserializes_with_defaults() {
        let build: DecodedBuild = serde_json::from_str(
            r#"{
                "version": 6,
                "classIndex": 3,
                "allocatedNodeIds": ["10", "11"],
                "masteryEffectSelections": { "11": 400 }
            }"#,
        )
        .expect("decoded build");

        assert_eq!(build.class_index, 3);
        assert_eq!(build.ascendancy_index, 0);
        assert_eq!(build.allocated_node_ids, vec!["10", "11"]);
        assert!(build.extended_node_ids.is_empty());
        assert_eq!(build.mastery_effect_selections.get("11"), Some(&400));
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = BuildSnapshot {
            class_index: 1,
            ascendancy_index: 2,
            allocated_node_ids: vec!["7".to_string()],
            mastery_effect_selections: BTreeMap::new(),
        };
        let json = serde_json::to_string(&snapshot).expect("serialize");
        assert!(json.contains("\"classIndex\":1"));
        assert!(json.contains("\"ascendancyIndex\":2"));
        assert!(json.contains("\"allocatedNodeIds\":[\"7\"]"));
    }
}
