//! Layered configuration merging.
//!
//! Later layers override earlier ones:
//!
//! - mappings merge key by key, recursively
//! - sequences are replaced wholesale, so a local `success_markers` list
//!   replaces the global one instead of extending it
//! - a `null` in the overlay deletes the key
//! - any other value in the overlay wins

use serde_yaml::Value;

/// Merge `overlay` onto `base`, returning a new value.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();
            for (key, overlay_value) in overlay_map {
                if overlay_value.is_null() {
                    result.remove(key);
                } else if let Some(base_value) = base_map.get(key) {
                    result.insert(key.clone(), deep_merge(base_value, overlay_value));
                } else {
                    result.insert(key.clone(), overlay_value.clone());
                }
            }
            Value::Mapping(result)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Fold `layers` in order onto an empty mapping.
///
/// Empty documents (which parse as `null`) are ignored rather than
/// clearing everything merged so far.
pub fn merge_configs(layers: &[Value]) -> Value {
    layers
        .iter()
        .filter(|layer| !layer.is_null())
        .fold(Value::Mapping(Default::default()), |acc, layer| {
            deep_merge(&acc, layer)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn overlay_scalar_wins() {
        let merged = deep_merge(&yaml("build_mode: clean"), &yaml("build_mode: xbox"));
        assert_eq!(merged["build_mode"], "xbox");
    }

    #[test]
    fn nested_tool_paths_merge() {
        let base = yaml("tools:\n  fallout4: /games/fo4\n  xedit: /old/FO4Edit.exe");
        let overlay = yaml("tools:\n  xedit: /new/FO4Edit.exe");
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged["tools"]["fallout4"], "/games/fo4");
        assert_eq!(merged["tools"]["xedit"], "/new/FO4Edit.exe");
    }

    #[test]
    fn sequences_are_replaced() {
        let base = yaml("classifier:\n  success_markers: [a, b]");
        let overlay = yaml("classifier:\n  success_markers: [c]");
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged["classifier"]["success_markers"], yaml("[c]"));
    }

    #[test]
    fn null_deletes_key() {
        let base = yaml("tools:\n  bsarch: /tools/bsarch.exe\n  xedit: /x.exe");
        let overlay = yaml("tools:\n  bsarch: ~");
        let merged = deep_merge(&base, &overlay);
        assert!(merged["tools"].get("bsarch").is_none());
        assert_eq!(merged["tools"]["xedit"], "/x.exe");
    }

    #[test]
    fn empty_layers_are_skipped() {
        let merged = merge_configs(&[
            yaml("artifact_wait_secs: 10"),
            Value::Null,
            yaml("build_mode: filtered"),
        ]);
        assert_eq!(merged["artifact_wait_secs"], 10);
        assert_eq!(merged["build_mode"], "filtered");
    }

    #[test]
    fn no_layers_is_empty_mapping() {
        assert!(merge_configs(&[]).is_mapping());
    }
}
