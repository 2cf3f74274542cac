use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tourdesk_catalog::{RouteCatalog, VehicleCatalog};
use tourdesk_core::{CoreError, CoreResult, RequestContext};
use uuid::Uuid;

/// One physical departure: route × date × time, run with one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledTour {
    pub id: Uuid,
    pub tenant_id: String,
    pub route_id: String,
    pub tour_date: NaiveDate,
    #[serde(with = "tourdesk_shared::time::hhmm")]
    pub start_time: NaiveTime,
    pub vehicle_type_id: String,
    pub capacity: u32,
    /// Set once a booking targets this tour; capacity cannot change after.
    pub capacity_fixed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TourKey {
    tenant_id: String,
    route_id: String,
    tour_date: NaiveDate,
    start_time: NaiveTime,
}

#[derive(Default)]
struct RegistryState {
    tours: HashMap<Uuid, ScheduledTour>,
    index: HashMap<TourKey, Uuid>,
}

/// Materializes tour instances and owns their capacity.
pub struct ScheduledTourRegistry {
    vehicles: Arc<VehicleCatalog>,
    routes: Arc<RouteCatalog>,
    state: RwLock<RegistryState>,
}

impl ScheduledTourRegistry {
    pub fn new(vehicles: Arc<VehicleCatalog>, routes: Arc<RouteCatalog>) -> Self {
        Self {
            vehicles,
            routes,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn routes(&self) -> &RouteCatalog {
        &self.routes
    }

    pub fn vehicles(&self) -> &VehicleCatalog {
        &self.vehicles
    }

    /// Find-or-create. Identical (route, date, time) within a tenant always
    /// yields the same tour, so independently created bookings share
    /// occupancy. The vehicle only matters when the tour is created.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        route_id: &str,
        tour_date: NaiveDate,
        start_time: NaiveTime,
        vehicle_type_id: &str,
    ) -> CoreResult<ScheduledTour> {
        let capacity = self.capacity_for(route_id, vehicle_type_id)?;
        let key = TourKey {
            tenant_id: ctx.tenant_id.clone(),
            route_id: route_id.to_string(),
            tour_date,
            start_time,
        };

        if let Some(existing) = self.lookup(&key).await {
            return Ok(existing);
        }

        let mut state = self.state.write().await;
        // Another request may have created it between the two locks.
        if let Some(id) = state.index.get(&key) {
            if let Some(tour) = state.tours.get(id) {
                return Ok(tour.clone());
            }
        }

        let tour = Self::insert(&mut state, key, vehicle_type_id, capacity);
        tracing::info!(
            tour_id = %tour.id,
            route_id,
            %tour_date,
            capacity,
            "Scheduled tour created on first booking"
        );
        Ok(tour)
    }

    /// Explicit operator creation; refuses to shadow an existing departure.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        route_id: &str,
        tour_date: NaiveDate,
        start_time: NaiveTime,
        vehicle_type_id: &str,
    ) -> CoreResult<ScheduledTour> {
        let capacity = self.capacity_for(route_id, vehicle_type_id)?;
        let key = TourKey {
            tenant_id: ctx.tenant_id.clone(),
            route_id: route_id.to_string(),
            tour_date,
            start_time,
        };

        let mut state = self.state.write().await;
        if state.index.contains_key(&key) {
            return Err(CoreError::validation(format!(
                "route {} already departs on {} at {}",
                route_id,
                tour_date,
                start_time.format("%H:%M")
            )));
        }

        let tour = Self::insert(&mut state, key, vehicle_type_id, capacity);
        tracing::info!(tour_id = %tour.id, route_id, %tour_date, capacity, "Scheduled tour created by operator");
        Ok(tour)
    }

    pub async fn get(&self, ctx: &RequestContext, tour_id: Uuid) -> CoreResult<ScheduledTour> {
        let state = self.state.read().await;
        state
            .tours
            .get(&tour_id)
            .filter(|t| ctx.owns(&t.tenant_id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("scheduled_tour", tour_id))
    }

    pub async fn capacity_of(&self, tour_id: Uuid) -> CoreResult<u32> {
        let state = self.state.read().await;
        state
            .tours
            .get(&tour_id)
            .map(|t| t.capacity)
            .ok_or_else(|| CoreError::not_found("scheduled_tour", tour_id))
    }

    /// Swap the vehicle while nothing is booked yet. Seat writes fix the
    /// capacity first, so a tour with held seats is never resized here.
    pub async fn change_vehicle(
        &self,
        ctx: &RequestContext,
        tour_id: Uuid,
        vehicle_type_id: &str,
    ) -> CoreResult<ScheduledTour> {
        let mut state = self.state.write().await;
        let tour = state
            .tours
            .get_mut(&tour_id)
            .filter(|t| ctx.owns(&t.tenant_id))
            .ok_or_else(|| CoreError::not_found("scheduled_tour", tour_id))?;

        if tour.capacity_fixed {
            return Err(CoreError::validation(
                "capacity is fixed once bookings exist against the tour",
            ));
        }

        let capacity = {
            let route = self.routes.get(&tour.route_id)?;
            let vehicle = self.vehicles.get(vehicle_type_id)?;
            route.capacity_override.unwrap_or(vehicle.capacity)
        };

        tour.vehicle_type_id = vehicle_type_id.to_string();
        tour.capacity = capacity;
        tracing::info!(tour_id = %tour_id, vehicle_type_id, capacity, "Tour vehicle changed");
        Ok(tour.clone())
    }

    /// Called when a booking starts targeting the tour, and before any seat
    /// is written. Returns the capacity that is now fixed.
    pub async fn attach_booking(&self, tour_id: Uuid) -> CoreResult<u32> {
        let mut state = self.state.write().await;
        let tour = state
            .tours
            .get_mut(&tour_id)
            .ok_or_else(|| CoreError::not_found("scheduled_tour", tour_id))?;
        if !tour.capacity_fixed {
            tour.capacity_fixed = true;
            tracing::debug!(%tour_id, capacity = tour.capacity, "Tour capacity fixed");
        }
        Ok(tour.capacity)
    }

    pub async fn list_for_date(&self, ctx: &RequestContext, tour_date: NaiveDate) -> Vec<ScheduledTour> {
        let state = self.state.read().await;
        let mut tours: Vec<ScheduledTour> = state
            .tours
            .values()
            .filter(|t| ctx.owns(&t.tenant_id) && t.tour_date == tour_date)
            .cloned()
            .collect();
        tours.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.route_id.cmp(&b.route_id)));
        tours
    }

    fn capacity_for(&self, route_id: &str, vehicle_type_id: &str) -> CoreResult<u32> {
        let route = self.routes.get(route_id)?;
        let vehicle = self.vehicles.get(vehicle_type_id)?;
        Ok(route.capacity_override.unwrap_or(vehicle.capacity))
    }

    async fn lookup(&self, key: &TourKey) -> Option<ScheduledTour> {
        let state = self.state.read().await;
        state.index.get(key).and_then(|id| state.tours.get(id)).cloned()
    }

    fn insert(state: &mut RegistryState, key: TourKey, vehicle_type_id: &str, capacity: u32) -> ScheduledTour {
        let tour = ScheduledTour {
            id: Uuid::new_v4(),
            tenant_id: key.tenant_id.clone(),
            route_id: key.route_id.clone(),
            tour_date: key.tour_date,
            start_time: key.start_time,
            vehicle_type_id: vehicle_type_id.to_string(),
            capacity,
            capacity_fixed: false,
            created_at: Utc::now(),
        };
        state.index.insert(key, tour.id);
        state.tours.insert(tour.id, tour.clone());
        tour
    }
}
