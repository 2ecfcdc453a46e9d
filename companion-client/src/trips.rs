//! Trips API
//!
//! Plain request/response calls for the trip collection. Places, packing
//! items and suggestions hang off a trip and are managed by the sync crate.

use tracing::{debug, info};

use crate::error::Result;
use crate::routes;
use crate::transport::TransportClient;
use crate::types::{NewTrip, Trip, TripId};

/// Typed access to `/api/trips`.
#[derive(Clone)]
pub struct TripsApi {
    transport: TransportClient,
}

impl TripsApi {
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }

    /// All trips of the current user.
    pub async fn list(&self) -> Result<Vec<Trip>> {
        let trips: Vec<Trip> = self.transport.get(routes::TRIPS).await?;
        debug!(count = trips.len(), "Fetched trips");
        Ok(trips)
    }

    pub async fn get(&self, id: TripId) -> Result<Trip> {
        self.transport.get(&routes::trip(id)).await
    }

    /// Create a trip. Input is validated before any request is made.
    pub async fn create(&self, trip: &NewTrip) -> Result<Trip> {
        trip.validate()?;
        let created: Trip = self.transport.post(routes::TRIPS, trip).await?;
        info!(trip_id = %created.id, name = %created.name, "Trip created");
        Ok(created)
    }

    pub async fn delete(&self, id: TripId) -> Result<()> {
        self.transport.delete(&routes::trip(id)).await?;
        info!(trip_id = %id, "Trip deleted");
        Ok(())
    }
}
