//! Trait computation over a resolved value

use crate::fault::{isolate, FaultRecord};
use forb_core::CoreValue;
use forb_plugin::{CapabilityKind, CapabilityRegistry};
use serde::Serialize;
use tracing::debug;

/// One displayed fact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitFact {
    pub trait_id: String,
    pub name: String,
    pub text: String,
}

/// Facts computed for one value, in trait registration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraitSheet {
    pub facts: Vec<TraitFact>,
    pub faults: Vec<FaultRecord>,
    /// Eligible traits skipped by a cost gate
    pub gated: Vec<String>,
}

impl TraitSheet {
    pub fn texts(&self) -> Vec<&str> {
        self.facts.iter().map(|f| f.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Applies eligibility, cost gates and fault isolation to registered traits
#[derive(Debug, Clone, Copy, Default)]
pub struct TraitEngine {
    /// Gate imposed on every trait, on top of the trait's own
    max_input_size: Option<usize>,
}

impl TraitEngine {
    pub fn new(max_input_size: Option<usize>) -> Self {
        Self { max_input_size }
    }

    /// The tighter of the trait's own gate and the engine gate
    fn effective_gate(&self, declared: Option<usize>) -> Option<usize> {
        match (declared, self.max_input_size) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn compute(&self, registry: &CapabilityRegistry, value: &CoreValue) -> TraitSheet {
        let tag = value.tag();
        let size = value.input_size();
        let mut sheet = TraitSheet::default();
        let mut eligible = 0usize;

        for registered in registry.traits() {
            let meta = registered.meta();
            if !meta.accepts(tag) {
                continue;
            }
            eligible += 1;

            if let Some(limit) = self.effective_gate(meta.max_input_size) {
                if size > limit {
                    debug!(trait_id = %meta.id, size, limit, "trait skipped by cost gate");
                    sheet.gated.push(meta.id.clone());
                    continue;
                }
            }

            match isolate(CapabilityKind::Trait, &meta.id, || registered.plugin().observe(value)) {
                Ok(Some(text)) => sheet.facts.push(TraitFact {
                    trait_id: meta.id.clone(),
                    name: meta.name.clone(),
                    text,
                }),
                Ok(None) => {}
                Err(fault) => sheet.faults.push(fault),
            }
        }

        debug!(
            value_type = %tag,
            eligible,
            facts = sheet.facts.len(),
            gated = sheet.gated.len(),
            faults = sheet.faults.len(),
            "traits computed"
        );
        sheet
    }
}
