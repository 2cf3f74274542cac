use tourdesk_core::{CoreError, CoreResult};
use tourdesk_shared::Money;

use crate::route::{PriceBasis, Route};

/// Derives the charge for one booking on a route.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine;

impl PricingEngine {
    pub fn new() -> Self {
        Self
    }

    /// A manual price always wins and is used verbatim. Otherwise the route's
    /// base price is the whole-departure charge, unless the route is
    /// explicitly configured as per-passenger.
    pub fn price(
        &self,
        route: &Route,
        group_size: u32,
        override_price: Option<Money>,
    ) -> CoreResult<Money> {
        if group_size < 1 {
            return Err(CoreError::validation("group size must be at least 1"));
        }

        if let Some(manual) = override_price {
            if manual.is_negative() {
                return Err(CoreError::validation("price must not be negative"));
            }
            return Ok(manual);
        }

        match route.price_basis {
            PriceBasis::PerDeparture => Ok(route.base_price),
            PriceBasis::PerPassenger => route
                .base_price
                .times(group_size)
                .ok_or_else(|| CoreError::validation("price overflow")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourdesk_shared::Currency;

    fn route(basis: PriceBasis) -> Route {
        Route {
            id: "bosphorus".to_string(),
            name: "Bosphorus Cruise".to_string(),
            duration_minutes: 180,
            base_price: Money::new(40_000, Currency::Try),
            price_basis: basis,
            capacity_override: None,
        }
    }

    #[test]
    fn test_flat_price_ignores_group_size() {
        let engine = PricingEngine::new();
        let r = route(PriceBasis::PerDeparture);

        let solo = engine.price(&r, 1, None).unwrap();
        let group = engine.price(&r, 9, None).unwrap();
        assert_eq!(solo, Money::new(40_000, Currency::Try));
        assert_eq!(group, solo);
    }

    #[test]
    fn test_manual_price_wins() {
        let engine = PricingEngine::new();
        let manual = Money::new(12_345, Currency::Eur);
        assert_eq!(engine.price(&route(PriceBasis::PerPassenger), 4, Some(manual)).unwrap(), manual);
    }

    #[test]
    fn test_per_passenger_only_when_configured() {
        let engine = PricingEngine::new();
        let price = engine.price(&route(PriceBasis::PerPassenger), 3, None).unwrap();
        assert_eq!(price.amount_minor, 120_000);
    }

    #[test]
    fn test_rejects_negative_manual_price_and_empty_group() {
        let engine = PricingEngine::new();
        let r = route(PriceBasis::PerDeparture);
        assert!(matches!(
            engine.price(&r, 2, Some(Money::new(-1, Currency::Try))),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(engine.price(&r, 0, None), Err(CoreError::ValidationError(_))));
    }
}
