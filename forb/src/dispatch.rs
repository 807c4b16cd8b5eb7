//! Decoder dispatch and ranking

use crate::fault::{isolate, FaultRecord};
use forb_core::Interpretation;
use forb_plugin::{CapabilityKind, CapabilityRegistry, RegisteredDecoder};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ranked outcome of running decoders over one input
#[derive(Debug, Clone, Default)]
pub struct Dispatch {
    ranked: Vec<Interpretation>,
    faults: Vec<FaultRecord>,
}

impl Dispatch {
    pub fn top(&self) -> Option<&Interpretation> {
        self.ranked.first()
    }

    /// Full sequence, best first
    pub fn ranked(&self) -> &[Interpretation] {
        &self.ranked
    }

    /// Interpretations after the top one, at most `limit` (0 = no limit)
    pub fn alternatives(&self, limit: usize) -> &[Interpretation] {
        let rest = self.ranked.get(1..).unwrap_or(&[]);
        if limit == 0 {
            rest
        } else {
            &rest[..rest.len().min(limit)]
        }
    }

    pub fn faults(&self) -> &[FaultRecord] {
        &self.faults
    }

    /// No decoder produced anything. Not an error.
    pub fn is_uninterpretable(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Run every registered decoder over `input`.
pub fn dispatch(registry: &CapabilityRegistry, input: &str) -> Dispatch {
    run(registry.decoders().iter(), input)
}

/// Run only the decoders named by id or alias. An empty filter runs them all.
pub fn dispatch_filtered(registry: &CapabilityRegistry, input: &str, names: &[&str]) -> Dispatch {
    if names.is_empty() {
        return dispatch(registry, input);
    }

    let mut wanted = HashSet::new();
    for name in names {
        match registry.lookup_by_alias(name) {
            Some(id) => {
                wanted.insert(id);
            }
            None => warn!(decoder = %name, "ignoring unknown decoder in filter"),
        }
    }
    run(registry.decoders().iter().filter(|d| wanted.contains(d.meta().id.as_str())), input)
}

/// Decoders arrive in registration order; the stable sort below relies on it.
fn run<'a>(decoders: impl Iterator<Item = &'a RegisteredDecoder>, input: &str) -> Dispatch {
    let mut out = Dispatch::default();
    let mut consulted = 0usize;

    for decoder in decoders {
        consulted += 1;
        let id = decoder.meta().id.as_str();
        match isolate(CapabilityKind::Decoder, id, || decoder.plugin().decode(input)) {
            Ok(found) => out.ranked.extend(found.into_iter().map(|i| i.with_source(id))),
            Err(fault) => out.faults.push(fault),
        }
    }

    // Stable: equal confidence keeps registration order
    out.ranked.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));

    debug!(
        decoders = consulted,
        interpretations = out.ranked.len(),
        faults = out.faults.len(),
        "dispatch complete"
    );
    out
}
