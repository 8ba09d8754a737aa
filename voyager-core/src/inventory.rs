//! The inventory provider contract (spec §6 "Outbound: Inventory provider").
//!
//! Defines the trait the Verifier calls against for flight/hotel search, the
//! wire-level result shapes, and a mock implementation used by tests and by
//! local development deployments in place of a live provider.

use crate::itinerary::{Cost, Location};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// A concrete flight offer returned by `search_flights`.
#[derive(Debug, Clone)]
pub struct FlightOption {
    pub carrier_code: String,
    pub flight_number: String,
    pub origin: Location,
    pub destination: Location,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub cost: Cost,
    pub baggage_allowance: Option<String>,
}

/// A hotel shortlist entry returned by `search_hotels_by_city`.
#[derive(Debug, Clone)]
pub struct HotelSummary {
    pub hotel_id: String,
    pub name: String,
    pub rating: Option<f32>,
}

/// A priced hotel offer returned by `search_hotel_offers`.
#[derive(Debug, Clone)]
pub struct HotelOffer {
    pub hotel_id: String,
    pub room_description: String,
    pub cost: Cost,
}

/// Errors surfaced by an inventory provider call, pre-classified by the
/// provider implementation into the domain taxonomy the Verifier expects.
/// Concrete HTTP-backed implementations map transport status codes onto
/// this enum at the call boundary (see the teacher's `map_http_error`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum InventoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("server error: {0}")]
    ServerError(String),
    #[error("search failed: {0}")]
    SearchFailed(String),
}

/// The Verifier's sole outbound dependency: live flight/hotel inventory.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn search_flights(
        &self,
        origin_code: &str,
        destination_code: &str,
        departure_date: DateTime<Utc>,
        travelers: u32,
        currency: &str,
    ) -> Result<Vec<FlightOption>, InventoryError>;

    async fn search_hotels_by_city(&self, city_code: &str) -> Result<Vec<HotelSummary>, InventoryError>;

    async fn search_hotel_offers(
        &self,
        hotel_ids: &[String],
        adults: u32,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
        currency: &str,
    ) -> Result<Vec<HotelOffer>, InventoryError>;

    async fn search_locations(&self, keyword: &str) -> Result<Vec<Location>, InventoryError>;
}

/// An in-memory inventory provider driven by pre-seeded fixtures, for tests
/// and local development. Lookups are keyed by `(origin, destination)` for
/// flights and by city code for hotels.
pub struct MockInventoryProvider {
    flights: Mutex<HashMap<(String, String), Vec<FlightOption>>>,
    hotels_by_city: Mutex<HashMap<String, Vec<HotelSummary>>>,
    hotel_offers: Mutex<HashMap<String, HotelOffer>>,
    locations: Mutex<HashMap<String, Vec<Location>>>,
}

impl MockInventoryProvider {
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            hotels_by_city: Mutex::new(HashMap::new()),
            hotel_offers: Mutex::new(HashMap::new()),
            locations: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed_flight(&self, origin: &str, destination: &str, option: FlightOption) {
        self.flights
            .lock()
            .unwrap()
            .entry((origin.to_string(), destination.to_string()))
            .or_default()
            .push(option);
    }

    pub fn seed_hotels_by_city(&self, city_code: &str, summaries: Vec<HotelSummary>) {
        self.hotels_by_city.lock().unwrap().insert(city_code.to_string(), summaries);
    }

    pub fn seed_hotel_offer(&self, hotel_id: &str, offer: HotelOffer) {
        self.hotel_offers.lock().unwrap().insert(hotel_id.to_string(), offer);
    }

    pub fn seed_location(&self, keyword: &str, locations: Vec<Location>) {
        self.locations.lock().unwrap().insert(keyword.to_string(), locations);
    }
}

impl Default for MockInventoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryProvider for MockInventoryProvider {
    async fn search_flights(
        &self,
        origin_code: &str,
        destination_code: &str,
        _departure_date: DateTime<Utc>,
        _travelers: u32,
        _currency: &str,
    ) -> Result<Vec<FlightOption>, InventoryError> {
        Ok(self
            .flights
            .lock()
            .unwrap()
            .get(&(origin_code.to_string(), destination_code.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn search_hotels_by_city(&self, city_code: &str) -> Result<Vec<HotelSummary>, InventoryError> {
        Ok(self.hotels_by_city.lock().unwrap().get(city_code).cloned().unwrap_or_default())
    }

    async fn search_hotel_offers(
        &self,
        hotel_ids: &[String],
        _adults: u32,
        _check_in: DateTime<Utc>,
        _check_out: DateTime<Utc>,
        _currency: &str,
    ) -> Result<Vec<HotelOffer>, InventoryError> {
        let offers = self.hotel_offers.lock().unwrap();
        Ok(hotel_ids.iter().filter_map(|id| offers.get(id).cloned()).collect())
    }

    async fn search_locations(&self, keyword: &str) -> Result<Vec<Location>, InventoryError> {
        Ok(self.locations.lock().unwrap().get(keyword).cloned().unwrap_or_default())
    }
}
