use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tourdesk_core::{CoreError, CoreResult};

/// Reference data: a bookable vehicle class and how many passengers it seats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VehicleType {
    pub id: String,
    pub name: String,
    pub capacity: u32,
}

impl VehicleType {
    pub fn new(id: impl Into<String>, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capacity,
        }
    }
}

/// Static vehicle type → capacity table.
#[derive(Debug, Clone, Default)]
pub struct VehicleCatalog {
    vehicles: HashMap<String, VehicleType>,
}

impl VehicleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fleet classes a transfer/tour agency works with out of the box.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for vehicle in [
            VehicleType::new("sedan", "Sedan", 3),
            VehicleType::new("vito", "Mercedes Vito", 6),
            VehicleType::new("sprinter", "Mercedes Sprinter", 16),
            VehicleType::new("midibus", "Midibus", 27),
            VehicleType::new("bus", "Coach", 46),
        ] {
            catalog.vehicles.insert(vehicle.id.clone(), vehicle);
        }
        catalog
    }

    pub fn from_entries(entries: impl IntoIterator<Item = VehicleType>) -> CoreResult<Self> {
        let mut catalog = Self::new();
        for vehicle in entries {
            catalog.insert(vehicle)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, vehicle: VehicleType) -> CoreResult<()> {
        if vehicle.capacity < 1 {
            return Err(CoreError::validation(format!(
                "vehicle type '{}' must seat at least one passenger",
                vehicle.id
            )));
        }
        self.vehicles.insert(vehicle.id.clone(), vehicle);
        Ok(())
    }

    pub fn get(&self, id: &str) -> CoreResult<&VehicleType> {
        self.vehicles
            .get(id)
            .ok_or_else(|| CoreError::not_found("vehicle_type", id))
    }

    pub fn capacity_of(&self, id: &str) -> CoreResult<u32> {
        self.get(id).map(|v| v.capacity)
    }

    pub fn list(&self) -> Vec<&VehicleType> {
        let mut all: Vec<&VehicleType> = self.vehicles.values().collect();
        all.sort_by(|a, b| a.capacity.cmp(&b.capacity).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
