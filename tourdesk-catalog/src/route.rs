use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tourdesk_core::{CoreError, CoreResult};
use tourdesk_shared::Money;

/// How a route's base price relates to group size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// Whole-departure charge; group size only bounds capacity.
    #[default]
    PerDeparture,
    PerPassenger,
}

/// A sellable tour route, configured in the back office.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub duration_minutes: u32,
    pub base_price: Money,
    #[serde(default)]
    pub price_basis: PriceBasis,
    /// Fixed capacity that wins over the vehicle's seat count.
    #[serde(default)]
    pub capacity_override: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    routes: HashMap<String, Route>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = Route>) -> CoreResult<Self> {
        let mut catalog = Self::new();
        for route in entries {
            catalog.insert(route)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, route: Route) -> CoreResult<()> {
        if route.base_price.is_negative() {
            return Err(CoreError::validation(format!(
                "route '{}' has a negative base price",
                route.id
            )));
        }
        if route.capacity_override == Some(0) {
            return Err(CoreError::validation(format!(
                "route '{}' capacity override must be at least 1",
                route.id
            )));
        }
        self.routes.insert(route.id.clone(), route);
        Ok(())
    }

    pub fn get(&self, id: &str) -> CoreResult<&Route> {
        self.routes
            .get(id)
            .ok_or_else(|| CoreError::not_found("route", id))
    }

    pub fn list(&self) -> Vec<&Route> {
        let mut all: Vec<&Route> = self.routes.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
