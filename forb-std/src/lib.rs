//! forb Standard Library
//!
//! Bundled plugins for every capability kind.

pub mod decoders;
pub mod checksums;
pub mod math;
pub mod currency;

use forb_plugin::{Capability, CapabilityRegistry, LoadReport};

pub use currency::FixedRateProvider;

/// Every bundled capability, in registration order
pub fn bundled_capabilities() -> Vec<Capability> {
    vec![
        // Decoders
        Capability::decoder(decoders::ExampleFormat),
        Capability::decoder(decoders::Rot13),
        Capability::decoder(decoders::HexBytes),
        Capability::decoder(decoders::DecimalInteger),
        Capability::decoder(decoders::CurrencyAmount),
        // Traits
        Capability::trait_(checksums::Sha256Trait),
        Capability::trait_(checksums::Sha512Trait),
        Capability::trait_(checksums::Blake3Trait),
        Capability::trait_(checksums::LuckyNumber),
        // Constants
        Capability::expr_var(math::Pi),
        Capability::expr_var(math::Euler),
        Capability::expr_var(math::Phi),
        Capability::expr_var(math::Tau),
        // Functions
        Capability::expr_func(math::Factorial),
        Capability::expr_func(math::Fib),
        Capability::expr_func(math::Gcd),
        Capability::expr_func(math::Lcm),
        Capability::expr_func(math::IsPrime),
        Capability::expr_func(math::Sqrt),
        Capability::expr_func(math::Log),
        Capability::expr_func(math::Log10),
        Capability::expr_func(math::Sin),
        Capability::expr_func(math::Cos),
        Capability::expr_func(math::Tan),
    ]
}

/// Load the bundled plugins into a registry
pub fn load_bundled(registry: &mut CapabilityRegistry) -> LoadReport {
    registry.register_all(bundled_capabilities())
}

/// Create a registry holding only the bundled plugins
pub fn standard_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    load_bundled(&mut registry);
    registry
}
