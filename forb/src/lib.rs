//! forb - interpret raw input through pluggable capabilities
//!
//! The engine runs registered decoders over raw text and ranks what they
//! produce, computes trait facts for a resolved value, converts currency
//! amounts through a shared rate cache, follows decoder conversion edges
//! from each interpretation, and exposes expression constants and
//! functions to an evaluator.

mod fault;
pub mod cache;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod expr;
pub mod resolver;
pub mod traits;

pub use cache::{CacheSettings, Clock, EntryState, RateCache, RateQuote, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use convert::{find_conversions, ConversionPath, ConversionSet, ConvertedInterpretation};
pub use dispatch::{dispatch, dispatch_filtered, Dispatch};
pub use expr::ExprTable;
pub use fault::FaultRecord;
pub use resolver::RateResolver;
pub use traits::{TraitEngine, TraitFact, TraitSheet};

use forb_core::CoreValue;
use forb_plugin::{CapabilityRegistry, EvalContext, LoadReport};
use std::sync::Arc;
use tracing::info;

/// Main forb engine
///
/// Owns the read-only registry and the rate cache. Cheap to share behind
/// an `Arc`; every method takes `&self`.
pub struct Forb {
    registry: Arc<CapabilityRegistry>,
    config: EngineConfig,
    traits: TraitEngine,
    rates: RateResolver,
    expr: ExprTable,
}

impl Forb {
    pub fn new(registry: CapabilityRegistry, config: EngineConfig) -> Self {
        let registry = Arc::new(registry);
        let cache = Arc::new(RateCache::new(&registry, config.cache_settings()));
        Self::assemble(registry, config, cache)
    }

    /// Like `new`, with the rate cache reading time from `clock`.
    pub fn with_clock(registry: CapabilityRegistry, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let registry = Arc::new(registry);
        let cache = Arc::new(RateCache::new(&registry, config.cache_settings()).with_clock(clock));
        Self::assemble(registry, config, cache)
    }

    fn assemble(registry: Arc<CapabilityRegistry>, config: EngineConfig, cache: Arc<RateCache>) -> Self {
        let traits = TraitEngine::new(config.traits.max_input_size);
        let rates = RateResolver::new(&registry, cache);
        let expr = ExprTable::new(Arc::clone(&registry), EvalContext::new().with_precision(config.precision));
        Self { registry, config, traits, rates, expr }
    }

    /// Bundled plugins plus the currencies declared in `config`.
    ///
    /// Registrations that fail are skipped and listed in the report.
    pub fn with_standard_library(config: EngineConfig) -> (Self, LoadReport) {
        let mut registry = CapabilityRegistry::new();
        let mut report = forb_std::load_bundled(&mut registry);
        report.merge(registry.register_all(config.currency_capabilities()));
        info!(
            capabilities = report.total_loaded(),
            rejected = report.rejected.len(),
            "forb engine ready"
        );
        (Self::new(registry, config), report)
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every decoder over `input`, best interpretation first
    pub fn interpret(&self, input: &str) -> Dispatch {
        dispatch(&self.registry, input)
    }

    /// Only the decoders named by id or alias
    pub fn interpret_filtered(&self, input: &str, names: &[&str]) -> Dispatch {
        dispatch_filtered(&self.registry, input, names)
    }

    /// Each interpretation of `input`, best first, with the values it
    /// converts to. The decoder behind an interpretation is not a target.
    pub fn convert_all(&self, input: &str) -> Vec<ConvertedInterpretation> {
        self.interpret(input)
            .ranked()
            .iter()
            .map(|interp| ConvertedInterpretation {
                conversions: find_conversions(&self.registry, interp.value(), Some(interp.source_decoder())),
                interpretation: interp.clone(),
            })
            .collect()
    }

    /// Trait facts for `value`, without currency conversion
    pub fn traits_for(&self, value: &CoreValue) -> TraitSheet {
        self.traits.compute(&self.registry, value)
    }

    /// Trait facts followed by conversions into the configured target
    /// currencies when `value` is a currency amount.
    pub async fn describe_value(&self, value: &CoreValue) -> TraitSheet {
        let mut sheet = self.traits_for(value);
        let conversions = self.rates.currency_facts(value, &self.config.target_currencies).await;
        sheet.facts.extend(conversions);
        sheet
    }

    pub fn expr(&self) -> &ExprTable {
        &self.expr
    }

    pub fn rates(&self) -> &RateResolver {
        &self.rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forb_core::{codes, Interpretation, Number, TypeTag};
    use forb_plugin::{Capability, CapabilityKind, DecoderMeta, DecoderPlugin, PluginFailure};

    fn config_with_btc() -> EngineConfig {
        EngineConfig::from_toml_str(
            r#"
            target_currencies = ["USD", "EUR"]

            [currencies.BTC]
            rate = 50000
            symbol = "₿"
            name = "Bitcoin"
            decimals = 8

            [currencies.EUR]
            rate = "1.25"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_standard_library_loads_everything() {
        let (forb, report) = Forb::with_standard_library(config_with_btc());
        assert!(!report.has_errors());
        assert_eq!(report.ids(CapabilityKind::CurrencyProvider), vec!["BTC", "EUR"]);
        assert_eq!(forb.registry().len_of(CapabilityKind::Decoder), 5);
        assert_eq!(forb.expr().context().precision, 50);
    }

    #[test]
    fn test_config_currency_colliding_with_plugin_is_rejected() {
        let mut cfg = config_with_btc();
        let dup = cfg.currencies["BTC"].clone();
        cfg.currencies.insert("btc".into(), dup);
        let (forb, report) = Forb::with_standard_library(cfg);
        assert_eq!(report.rejected.len(), 1);
        assert!(forb.registry().currency("BTC").is_some());
    }

    #[test]
    fn test_interpret_example_input() {
        let (forb, _) = Forb::with_standard_library(EngineConfig::default());
        let result = forb.interpret("EXAMPLE:hi");
        let top = result.top().unwrap();
        assert_eq!(top.source_decoder(), "example-format");
        assert_eq!(top.value(), &CoreValue::from("hi"));

        let only_rot13 = forb.interpret_filtered("EXAMPLE:hi", &["rot13"]);
        assert!(only_rot13.is_uninterpretable());
    }

    #[test]
    fn test_traits_for_decoded_bytes() {
        let (forb, _) = Forb::with_standard_library(EngineConfig::default());
        let result = forb.interpret("0x616263");
        let top = result.top().unwrap();
        assert_eq!(top.value().tag(), TypeTag::Bytes);

        let sheet = forb.traits_for(top.value());
        assert_eq!(
            sheet.texts()[0],
            "sha256: ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sheet.facts.len(), 3);
    }

    #[test]
    fn test_engine_gate_from_config() {
        let mut cfg = EngineConfig::default();
        cfg.traits.max_input_size = Some(2);
        let (forb, _) = Forb::with_standard_library(cfg);
        let sheet = forb.traits_for(&CoreValue::Bytes(b"abc".to_vec()));
        assert!(sheet.is_empty());
        assert_eq!(sheet.gated, vec!["sha256", "sha512", "blake3"]);
    }

    #[tokio::test]
    async fn test_describe_currency_value() {
        let (forb, _) = Forb::with_standard_library(config_with_btc());
        let result = forb.interpret("1.5 BTC");
        let top = result.top().unwrap();
        assert_eq!(top.source_decoder(), "currency-amount");

        let sheet = forb.describe_value(top.value()).await;
        assert_eq!(sheet.texts(), vec!["1.5 BTC = 75000.00 USD", "1.5 BTC = 60000.00 EUR"]);
        assert_eq!(forb.rates().cache().state("BTC"), Some(EntryState::Fresh));

        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json["facts"][0]["trait_id"], "convert:usd");
        assert_eq!(json["gated"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_describe_non_currency_has_no_conversions() {
        let (forb, _) = Forb::with_standard_library(config_with_btc());
        let sheet = forb.describe_value(&CoreValue::Integer(42)).await;
        assert_eq!(sheet.texts(), vec!["Lucky number (42)"]);
    }

    #[test]
    fn test_convert_all_per_interpretation() {
        let (forb, _) = Forb::with_standard_library(EngineConfig::default());
        let converted = forb.convert_all("42");
        let sources: Vec<&str> = converted.iter().map(|c| c.interpretation.source_decoder()).collect();
        assert_eq!(sources, vec!["integer", "hex"]);

        // 42 as an integer becomes the byte 0x2a; the byte 0x42 reads as 66
        assert_eq!(converted[0].conversions.displays(), vec!["0x2a"]);
        assert_eq!(converted[1].conversions.displays(), vec!["66"]);
        assert_eq!(converted[1].conversions.found[0].path, vec!["hex", "integer"]);

        let huge = forb.interpret("1e20000000 BTC");
        assert!(huge.ranked().iter().all(|i| i.source_decoder() != "currency-amount"));
        assert!(huge.faults().is_empty());
    }

    #[test]
    fn test_expr_uses_configured_precision() {
        let mut cfg = EngineConfig::default();
        cfg.precision = 20;
        let (forb, _) = Forb::with_standard_library(cfg);
        assert_eq!(forb.expr().context().precision, 20);
        assert_eq!(forb.expr().call("fib", &[Number::from_i64(10)]).unwrap(), Number::from_i64(55));
        assert!(forb.expr().call("fib", &[]).unwrap_err().is(codes::ARITY_MISMATCH));
    }

    #[test]
    fn test_faulty_decoder_does_not_hide_others() {
        struct Broken;
        impl DecoderPlugin for Broken {
            fn meta(&self) -> DecoderMeta {
                DecoderMeta::new("broken", "Broken")
            }
            fn decode(&self, _input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
                panic!("index out of bounds")
            }
        }

        let mut registry = forb_std::standard_registry();
        registry.register(Capability::decoder(Broken)).unwrap();
        let forb = Forb::new(registry, EngineConfig::default());
        let result = forb.interpret("EXAMPLE:hi");
        assert_eq!(result.top().map(|i| i.source_decoder()), Some("example-format"));
        assert_eq!(result.faults().len(), 1);
        assert_eq!(result.faults()[0].capability_id, "broken");
    }
}
