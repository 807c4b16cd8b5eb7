//! Currency conversion through cached rates

use crate::cache::RateCache;
use crate::traits::TraitFact;
use forb_core::{CoreValue, Number};
use forb_plugin::CapabilityRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_DECIMALS: u8 = 2;

pub struct RateResolver {
    cache: Arc<RateCache>,
    decimals: HashMap<String, u8>,
}

impl RateResolver {
    pub fn new(registry: &CapabilityRegistry, cache: Arc<RateCache>) -> Self {
        let decimals = registry
            .currencies()
            .iter()
            .map(|c| (c.meta().code.clone(), c.meta().decimals))
            .collect();
        Self { cache, decimals }
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Display decimals for a code; 2 when no provider declares it.
    pub fn decimals(&self, code: &str) -> u8 {
        self.decimals.get(&code.to_uppercase()).copied().unwrap_or(DEFAULT_DECIMALS)
    }

    /// Convert `amount` of `from` into `to`.
    ///
    /// Tries, in order: identity, a direct quote `from -> to`, the inverse
    /// of a quote `to -> from`, and a cross rate when both quote against
    /// the same currency. `None` when no path exists or a rate is unknown.
    pub async fn convert(&self, amount: &Number, from: &str, to: &str) -> Option<Number> {
        let (from, to) = (from.trim().to_uppercase(), to.trim().to_uppercase());
        if from == to {
            return Some(amount.clone());
        }

        let from_quote = self.cache.get(&from).await;
        if let Some(q) = &from_quote {
            if q.quote_currency == to {
                return Some(amount.mul(&q.rate));
            }
        }

        let to_quote = self.cache.get(&to).await?;
        if to_quote.quote_currency == from {
            return amount.checked_div(&to_quote.rate).ok();
        }

        let from_quote = from_quote?;
        if from_quote.quote_currency == to_quote.quote_currency {
            let in_quote = amount.mul(&from_quote.rate);
            return in_quote.checked_div(&to_quote.rate).ok();
        }

        debug!(from = %from, to = %to, "no conversion path");
        None
    }

    /// Conversion lines for a currency value, one per reachable target.
    pub async fn currency_facts(&self, value: &CoreValue, targets: &[String]) -> Vec<TraitFact> {
        let CoreValue::Currency { amount, code } = value else {
            return Vec::new();
        };

        let mut facts = Vec::new();
        for target in targets {
            let target = target.trim().to_uppercase();
            if target.is_empty() || target == code.to_uppercase() {
                continue;
            }
            if let Some(converted) = self.convert(amount, code, &target).await {
                let places = u32::from(self.decimals(&target));
                facts.push(TraitFact {
                    trait_id: format!("convert:{}", target.to_lowercase()),
                    name: format!("In {}", target),
                    text: format!("{} {} = {} {}", amount, code, converted.as_decimal(places), target),
                });
            }
        }
        facts
    }
}
