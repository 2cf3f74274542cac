use std::sync::Arc;
use tourdesk_catalog::{Route, RouteCatalog, VehicleCatalog, VehicleType};
use tourdesk_core::{CoreResult, SeatLedger};
use tourdesk_order::{BookingLifecycle, InMemorySeatLedger, ScheduledTourRegistry, SeatAllocator, VoucherBook};
use tourdesk_shared::Money;
use tourdesk_store::app_config::{CatalogConfig, RouteEntry};
use tourdesk_store::{Config, LedgerBackend, RedisSeatLedger};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<BookingLifecycle>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        vehicles: VehicleCatalog,
        routes: RouteCatalog,
        ledger: Arc<dyn SeatLedger>,
        voucher_prefix: &str,
        channel_capacity: usize,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(ScheduledTourRegistry::new(Arc::new(vehicles), Arc::new(routes)));
        let allocator = Arc::new(SeatAllocator::new(registry.clone(), ledger, channel_capacity));
        let lifecycle = BookingLifecycle::new(
            registry,
            allocator,
            Arc::new(VoucherBook::new(voucher_prefix)),
            channel_capacity,
        );

        Ok(Self {
            lifecycle: Arc::new(lifecycle),
            metrics: Arc::new(Metrics::new()?),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let vehicles = vehicle_catalog(&config.catalog)?;
        let routes = route_catalog(&config.catalog.routes)?;

        let ledger: Arc<dyn SeatLedger> = match config.ledger.backend {
            LedgerBackend::Memory => Arc::new(InMemorySeatLedger::new()),
            LedgerBackend::Redis => Arc::new(RedisSeatLedger::new(&config.redis.url)?),
        };
        tracing::info!(
            backend = ?config.ledger.backend,
            vehicles = vehicles.len(),
            routes = config.catalog.routes.len(),
            "Seat ledger ready"
        );

        Self::new(
            vehicles,
            routes,
            ledger,
            &config.vouchers.prefix,
            config.events.channel_capacity,
        )
    }
}

fn vehicle_catalog(config: &CatalogConfig) -> CoreResult<VehicleCatalog> {
    if config.vehicles.is_empty() {
        return Ok(VehicleCatalog::builtin());
    }
    VehicleCatalog::from_entries(
        config
            .vehicles
            .iter()
            .map(|v| VehicleType::new(v.id.clone(), v.name.clone(), v.capacity)),
    )
}

fn route_catalog(entries: &[RouteEntry]) -> CoreResult<RouteCatalog> {
    RouteCatalog::from_entries(entries.iter().map(|entry| Route {
        id: entry.id.clone(),
        name: entry.name.clone(),
        duration_minutes: entry.duration_minutes,
        base_price: Money::new(entry.base_price, entry.currency),
        price_basis: entry.price_basis,
        capacity_override: entry.capacity_override,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourdesk_catalog::PriceBasis;
    use tourdesk_shared::Currency;
    use tourdesk_store::app_config::VehicleEntry;

    fn entry(basis: PriceBasis) -> RouteEntry {
        RouteEntry {
            id: "red-tour".to_string(),
            name: "Red Tour".to_string(),
            duration_minutes: 480,
            base_price: 12_000,
            currency: Currency::Eur,
            price_basis: basis,
            capacity_override: None,
        }
    }

    #[test]
    fn test_empty_vehicle_config_uses_builtin_table() {
        let catalog = vehicle_catalog(&CatalogConfig::default()).unwrap();
        assert_eq!(catalog.capacity_of("vito").unwrap(), 6);

        let custom = CatalogConfig {
            vehicles: vec![VehicleEntry {
                id: "jeep".to_string(),
                name: "Safari Jeep".to_string(),
                capacity: 5,
            }],
            routes: vec![],
        };
        let catalog = vehicle_catalog(&custom).unwrap();
        assert_eq!(catalog.capacity_of("jeep").unwrap(), 5);
        assert!(catalog.get("vito").is_err());
    }

    #[test]
    fn test_route_entries_carry_price_basis() {
        let routes = route_catalog(&[entry(PriceBasis::PerPassenger)]).unwrap();
        assert_eq!(routes.get("red-tour").unwrap().price_basis, PriceBasis::PerPassenger);

        let mut negative = entry(PriceBasis::PerDeparture);
        negative.base_price = -1;
        assert!(route_catalog(&[negative]).is_err());
    }
}
