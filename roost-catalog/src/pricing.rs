use roost_core::discount::{DiscountGrant, DiscountType};
use roost_core::reservation::{DiscountApplication, PriceSnapshot};
use serde::{Deserialize, Serialize};

/// Basis points of an amount, floored. 10_000 bps = 100%.
fn bps_of(amount: i64, bps: i64) -> i64 {
    amount * bps / 10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// Tax on the post-discount subtotal, basis points.
    pub tax_rate_bps: i64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self { tax_rate_bps: 1_000 }
    }
}

/// Inputs to one price computation. Rates are minor currency units, one
/// entry per night of the stay.
#[derive(Debug, Clone)]
pub struct PriceQuote {
    pub nightly_rates: Vec<i64>,
    pub room_count: i64,
    pub package_discount_bps: i64,
    pub codes: Vec<DiscountGrant>,
}

/// Pure price computation. The whole checkout has exactly one pricing path:
/// every snapshot a reservation ever carries comes out of `compute`, so
/// display and invoicing cannot diverge.
pub struct PriceEngine {
    config: PriceConfig,
}

impl PriceEngine {
    pub fn new(config: PriceConfig) -> Self {
        Self { config }
    }

    /// Order of operations is contractual:
    /// subtotal -> package discount -> each code against the running
    /// (already discounted) subtotal, in application order -> tax -> total.
    /// The running subtotal floors at zero before tax; the total is never
    /// negative.
    pub fn compute(&self, quote: &PriceQuote) -> PriceSnapshot {
        let per_room: i64 = quote.nightly_rates.iter().sum();
        let subtotal = per_room * quote.room_count;

        let package_discount = bps_of(subtotal, quote.package_discount_bps).min(subtotal);
        let mut running = subtotal - package_discount;

        let mut code_discounts = Vec::with_capacity(quote.codes.len());
        for code in &quote.codes {
            let raw = match code.discount_type {
                DiscountType::Percent => {
                    let amount = bps_of(running, code.value);
                    match code.max_discount_cap {
                        Some(cap) => amount.min(cap),
                        None => amount,
                    }
                }
                DiscountType::Fixed => code.value,
            };
            // A code can never take the running subtotal below zero.
            let computed = raw.clamp(0, running);
            running -= computed;

            code_discounts.push(DiscountApplication {
                code: code.code.clone(),
                discount_type: code.discount_type,
                computed_amount: computed,
            });
        }

        let tax = bps_of(running, self.config.tax_rate_bps);

        PriceSnapshot {
            subtotal,
            package_discount,
            code_discounts,
            tax,
            total: running + tax,
        }
    }
}

impl Default for PriceEngine {
    fn default() -> Self {
        Self::new(PriceConfig::default())
    }
}
