//! Capability traits and their metadata
//!
//! Every capability returns its metadata once, at registration; the
//! registry keeps that copy for the life of the process. Call methods
//! distinguish three outcomes: a contribution, "nothing to contribute"
//! (empty / `None`), and a failure (`Err`).

use crate::{EvalContext, PluginFailure};
use forb_core::{CoreValue, ForbError, Interpretation, Number, TypeTag};
use serde::Serialize;

/// The pluggable extension kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Decoder,
    Trait,
    CurrencyProvider,
    ExprVar,
    ExprFunc,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CapabilityKind::Decoder => "decoder",
            CapabilityKind::Trait => "trait",
            CapabilityKind::CurrencyProvider => "currency provider",
            CapabilityKind::ExprVar => "expression constant",
            CapabilityKind::ExprFunc => "expression function",
        })
    }
}

/// Kind-independent view of a registration, used for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityMetadata {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub description: String,
    pub kind: CapabilityKind,
}

// ============================================================================
// Decoders
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecoderMeta {
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
}

impl DecoderMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn capability(&self) -> CapabilityMetadata {
        CapabilityMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            description: self.description.clone(),
            kind: CapabilityKind::Decoder,
        }
    }
}

/// One edge of the conversion graph: a value re-expressed in a decoder's
/// format. `value` may equal the value it came from when the edge only
/// renders it differently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub value: CoreValue,
    pub display: String,
}

impl Conversion {
    pub fn new(value: CoreValue, display: impl Into<String>) -> Self {
        Self { value, display: display.into() }
    }
}

/// Parses raw input into candidate interpretations.
///
/// Decoders are pure functions of their input. An empty vector means the
/// input is not in this decoder's format; it is not an error.
pub trait DecoderPlugin: Send + Sync {
    fn meta(&self) -> DecoderMeta;
    fn decode(&self, input: &str) -> Result<Vec<Interpretation>, PluginFailure>;

    /// Ways to express `value` in this decoder's format. Most decoders
    /// only read, so the default is none.
    fn conversions(&self, _value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Traits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Value kinds this trait may be invoked for; never empty.
    pub value_types: Vec<TypeTag>,
    /// Cost gate: values whose `input_size` exceeds this are skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input_size: Option<usize>,
}

impl TraitMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value_types: &[TypeTag]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            value_types: value_types.to_vec(),
            max_input_size: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_input_size(mut self, limit: usize) -> Self {
        self.max_input_size = Some(limit);
        self
    }

    pub fn accepts(&self, tag: TypeTag) -> bool {
        self.value_types.contains(&tag)
    }

    pub fn capability(&self) -> CapabilityMetadata {
        CapabilityMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            aliases: Vec::new(),
            description: self.description.clone(),
            kind: CapabilityKind::Trait,
        }
    }
}

/// Derives a human-readable fact from a resolved value.
///
/// `Ok(None)` means the trait does not apply to this particular value.
pub trait TraitPlugin: Send + Sync {
    fn meta(&self) -> TraitMeta;
    fn observe(&self, value: &CoreValue) -> Result<Option<String>, PluginFailure>;
}

// ============================================================================
// Currency providers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyMeta {
    /// ISO-like code, unique among providers
    pub code: String,
    pub symbol: String,
    pub name: String,
    /// Display decimals, independent of the live rate
    pub decimals: u8,
    pub description: String,
}

impl CurrencyMeta {
    pub fn new(code: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>, decimals: u8) -> Self {
        Self {
            code: code.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn capability(&self) -> CapabilityMetadata {
        CapabilityMetadata {
            id: self.code.clone(),
            name: self.name.clone(),
            aliases: Vec::new(),
            description: self.description.clone(),
            kind: CapabilityKind::CurrencyProvider,
        }
    }
}

/// One upstream reading: 1 unit of the provider's currency is worth
/// `rate` units of `quote_currency`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSample {
    pub rate: Number,
    pub quote_currency: String,
}

impl RateSample {
    pub fn new(rate: Number, quote_currency: impl Into<String>) -> Self {
        Self { rate, quote_currency: quote_currency.into() }
    }
}

/// Produces the current exchange rate for one currency.
///
/// Providers keep no rate state between calls; caching belongs to the
/// engine. `Ok(None)` means the rate is currently unavailable.
pub trait CurrencyPlugin: Send + Sync {
    fn meta(&self) -> CurrencyMeta;
    fn rate(&self) -> Result<Option<RateSample>, PluginFailure>;
}

// ============================================================================
// Expression extensions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprVarMeta {
    pub id: String,
    pub description: String,
}

impl ExprVarMeta {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: id.into(), description: description.into() }
    }

    pub fn capability(&self) -> CapabilityMetadata {
        CapabilityMetadata {
            id: self.id.clone(),
            name: self.id.clone(),
            aliases: Vec::new(),
            description: self.description.clone(),
            kind: CapabilityKind::ExprVar,
        }
    }
}

/// A named constant. Must be pure.
pub trait ExprVarPlugin: Send + Sync {
    fn meta(&self) -> ExprVarMeta;
    fn value(&self, ctx: &EvalContext) -> Result<Number, ForbError>;
}

/// How an argument is converted before the function sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coercion {
    /// Passed through unchanged
    Real,
    /// Fractional part dropped toward zero
    Truncate,
}

impl Coercion {
    pub fn apply(&self, n: &Number) -> Number {
        match self {
            Coercion::Real => n.clone(),
            Coercion::Truncate => n.trunc(),
        }
    }
}

/// Metadata about a function argument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgMeta {
    pub name: String,
    pub description: String,
    pub coercion: Coercion,
}

impl ArgMeta {
    pub fn real(name: &str, description: &str) -> Self {
        Self { name: name.to_string(), description: description.to_string(), coercion: Coercion::Real }
    }

    pub fn truncated(name: &str, description: &str) -> Self {
        Self { name: name.to_string(), description: description.to_string(), coercion: Coercion::Truncate }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprFuncMeta {
    pub id: String,
    pub description: String,
    /// Declared parameters; their count is the function's fixed arity.
    pub args: Vec<ArgMeta>,
}

impl ExprFuncMeta {
    pub fn new(id: impl Into<String>, description: impl Into<String>, args: Vec<ArgMeta>) -> Self {
        Self { id: id.into(), description: description.into(), args }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// e.g. `factorial(n: truncate)`
    pub fn usage(&self) -> String {
        let params: Vec<String> = self
            .args
            .iter()
            .map(|a| match a.coercion {
                Coercion::Real => a.name.clone(),
                Coercion::Truncate => format!("{}: truncate", a.name),
            })
            .collect();
        format!("{}({})", self.id, params.join(", "))
    }

    pub fn capability(&self) -> CapabilityMetadata {
        CapabilityMetadata {
            id: self.id.clone(),
            name: format!("{}()", self.id),
            aliases: Vec::new(),
            description: self.description.clone(),
            kind: CapabilityKind::ExprFunc,
        }
    }
}

/// A pure numeric function of fixed arity.
///
/// Arguments arrive already coerced per `ArgMeta::coercion` and already
/// checked against the declared arity.
pub trait ExprFuncPlugin: Send + Sync {
    fn meta(&self) -> ExprFuncMeta;
    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError>;
}
