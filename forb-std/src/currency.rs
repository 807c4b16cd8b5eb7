//! Fixed-rate currency providers

use forb_plugin::prelude::*;

/// A currency whose rate never changes, typically declared in configuration
#[derive(Debug, Clone)]
pub struct FixedRateProvider {
    meta: CurrencyMeta,
    sample: RateSample,
}

impl FixedRateProvider {
    pub fn new(meta: CurrencyMeta, rate: Number, quote_currency: impl Into<String>) -> Self {
        Self { meta, sample: RateSample::new(rate, quote_currency.into().to_uppercase()) }
    }
}

impl CurrencyPlugin for FixedRateProvider {
    fn meta(&self) -> CurrencyMeta {
        self.meta.clone()
    }

    fn rate(&self) -> Result<Option<RateSample>, PluginFailure> {
        Ok(Some(self.sample.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_rate() {
        let p = FixedRateProvider::new(
            CurrencyMeta::new("EUR", "€", "Euro", 2),
            Number::from_str("1.08").unwrap(),
            "usd",
        );
        let sample = p.rate().unwrap().unwrap();
        assert_eq!(sample.quote_currency, "USD");
        assert_eq!(sample.rate, Number::from_str("1.08").unwrap());
        assert_eq!(p.meta().decimals, 2);
    }
}
