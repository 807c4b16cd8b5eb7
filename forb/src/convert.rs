//! Conversion graph
//!
//! Breadth-first walk over the conversion edges decoders offer, starting
//! from one value. Paths are at most `MAX_DEPTH` edges long. The decoder the
//! value came from is never a target, and an edge leading back to a value
//! already reached is dropped.

use crate::fault::{isolate, FaultRecord};
use forb_core::{CoreValue, Interpretation};
use forb_plugin::{CapabilityKind, CapabilityRegistry};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

pub const MAX_DEPTH: usize = 5;

/// A value reached through one or more conversion edges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionPath {
    /// Decoder whose format the value ends in
    pub target: String,
    pub value: CoreValue,
    pub display: String,
    /// Decoder ids along the way, starting with the source when known
    pub path: Vec<String>,
    /// Edges walked, 1 for a direct conversion
    pub depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionSet {
    pub found: Vec<ConversionPath>,
    pub faults: Vec<FaultRecord>,
}

impl ConversionSet {
    pub fn displays(&self) -> Vec<&str> {
        self.found.iter().map(|c| c.display.as_str()).collect()
    }
}

/// One interpretation of an input and everything it converts to
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedInterpretation {
    pub interpretation: Interpretation,
    pub conversions: ConversionSet,
}

/// Every conversion reachable from `start`. `source` names the decoder
/// that produced `start`; it is excluded as a target.
pub fn find_conversions(registry: &CapabilityRegistry, start: &CoreValue, source: Option<&str>) -> ConversionSet {
    let mut out = ConversionSet::default();
    // (target decoder, display) pairs already reported
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut reached = vec![start.clone()];
    let mut faulted: HashSet<String> = HashSet::new();

    let root_path: Vec<String> = source.map(str::to_string).into_iter().collect();
    let mut queue = VecDeque::from([(start.clone(), root_path)]);

    for depth in 1..=MAX_DEPTH {
        if queue.is_empty() {
            break;
        }
        for _ in 0..queue.len() {
            let Some((current, path)) = queue.pop_front() else {
                break;
            };
            for decoder in registry.decoders() {
                let id = decoder.meta().id.as_str();
                if Some(id) == source || faulted.contains(id) {
                    continue;
                }
                let edges = match isolate(CapabilityKind::Decoder, id, || decoder.plugin().conversions(&current)) {
                    Ok(edges) => edges,
                    Err(fault) => {
                        faulted.insert(id.to_string());
                        out.faults.push(fault);
                        continue;
                    }
                };

                for edge in edges {
                    let moved = edge.value != current;
                    if moved && reached.contains(&edge.value) {
                        continue;
                    }
                    if !seen.insert((id.to_string(), edge.display.clone())) {
                        continue;
                    }
                    let mut next = path.clone();
                    next.push(id.to_string());
                    if moved {
                        reached.push(edge.value.clone());
                        queue.push_back((edge.value.clone(), next.clone()));
                    }
                    out.found.push(ConversionPath {
                        target: id.to_string(),
                        value: edge.value,
                        display: edge.display,
                        path: next,
                        depth,
                    });
                }
            }
        }
    }

    debug!(
        source = source.unwrap_or("-"),
        conversions = out.found.len(),
        faults = out.faults.len(),
        "conversion walk complete"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forb_plugin::{Capability, Conversion, DecoderMeta, DecoderPlugin, PluginFailure};

    /// Integer n converts to n + 1, forever
    struct Successor;

    impl DecoderPlugin for Successor {
        fn meta(&self) -> DecoderMeta {
            DecoderMeta::new("successor", "Successor")
        }

        fn decode(&self, _input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
            Ok(vec![])
        }

        fn conversions(&self, value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
            match value {
                CoreValue::Integer(n) => Ok(vec![Conversion::new(CoreValue::Integer(n + 1), (n + 1).to_string())]),
                _ => Ok(vec![]),
            }
        }
    }

    struct Exploding;

    impl DecoderPlugin for Exploding {
        fn meta(&self) -> DecoderMeta {
            DecoderMeta::new("exploding", "Exploding")
        }

        fn decode(&self, _input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
            Ok(vec![])
        }

        fn conversions(&self, _value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
            panic!("conversion table corrupt")
        }
    }

    #[test]
    fn test_bytes_convert_to_integer_without_self_edge() {
        let registry = forb_std::standard_registry();
        let out = find_conversions(&registry, &CoreValue::Bytes(vec![0x2a]), Some("hex"));
        assert_eq!(out.displays(), vec!["42"]);
        let only = &out.found[0];
        assert_eq!(only.target, "integer");
        assert_eq!(only.path, vec!["hex", "integer"]);
        assert_eq!(only.depth, 1);
        assert!(out.faults.is_empty());
    }

    #[test]
    fn test_integer_converts_to_hex() {
        let registry = forb_std::standard_registry();
        let out = find_conversions(&registry, &CoreValue::Integer(258), Some("integer"));
        assert_eq!(out.displays(), vec!["0x0102"]);
        assert_eq!(out.found[0].value, CoreValue::Bytes(vec![1, 2]));
    }

    #[test]
    fn test_walk_stops_at_max_depth() {
        let registry = CapabilityRegistry::new().with_decoder(Successor).unwrap();
        let out = find_conversions(&registry, &CoreValue::Integer(0), None);
        assert_eq!(out.displays(), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(out.found.iter().map(|c| c.depth).max(), Some(MAX_DEPTH));
        assert_eq!(out.found[4].path.len(), MAX_DEPTH);
    }

    #[test]
    fn test_cycles_back_to_reached_values_are_dropped() {
        let registry = forb_std::standard_registry();
        let start = CoreValue::from("hello");
        let out = find_conversions(&registry, &start, Some("example-format"));

        let rot13: Vec<&ConversionPath> = out.found.iter().filter(|c| c.target == "rot13-encoded").collect();
        assert_eq!(rot13.len(), 1);
        assert_eq!(rot13[0].display, "uryyb");
        assert!(out.found.iter().all(|c| c.value != start));
        assert!(out.found.iter().all(|c| c.target != "example-format"));
        assert!(out.displays().contains(&"0x68656c6c6f"));
    }

    #[test]
    fn test_faulty_conversion_is_isolated_once() {
        let registry = CapabilityRegistry::new()
            .with_decoder(Exploding)
            .unwrap()
            .with_decoder(Successor)
            .unwrap();
        let out = find_conversions(&registry, &CoreValue::Integer(0), None);
        assert_eq!(out.found.len(), MAX_DEPTH);
        assert_eq!(out.faults.len(), 1);
        assert_eq!(out.faults[0].capability_id, "exploding");
    }
}
