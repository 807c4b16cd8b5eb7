//! forb Plugin System
//!
//! Provides traits for extending forb with:
//! - Decoders (raw input -> ranked interpretations)
//! - Traits (derived facts about a resolved value)
//! - Currency providers (live exchange rates)
//! - Expression constants and functions

mod traits;
mod registry;
mod context;
mod error;

pub use traits::{
    CapabilityKind, CapabilityMetadata,
    DecoderPlugin, DecoderMeta, Conversion,
    TraitPlugin, TraitMeta,
    CurrencyPlugin, CurrencyMeta, RateSample,
    ExprVarPlugin, ExprVarMeta,
    ExprFuncPlugin, ExprFuncMeta,
    ArgMeta, Coercion,
};
pub use registry::{
    Capability, CapabilityRegistry, LoadReport, Registered,
    RegisteredDecoder, RegisteredTrait, RegisteredCurrency, RegisteredExprVar, RegisteredExprFunc,
};
pub use context::EvalContext;
pub use error::{PluginFailure, RegistryError};

/// Re-export core types for plugin authors
pub mod prelude {
    pub use crate::{
        Capability, CapabilityRegistry,
        DecoderPlugin, DecoderMeta, Conversion,
        TraitPlugin, TraitMeta,
        CurrencyPlugin, CurrencyMeta, RateSample,
        ExprVarPlugin, ExprVarMeta,
        ExprFuncPlugin, ExprFuncMeta,
        ArgMeta, Coercion, EvalContext, PluginFailure,
    };
    pub use forb_core::prelude::*;
}
