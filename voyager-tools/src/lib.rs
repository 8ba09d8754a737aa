//! # Voyager Tools
//!
//! The read-only capability registry used by the Planner (spec §4.2):
//! `date`, `location`, and `currency`. Booking/verification capabilities
//! (flight search, hotel search) are deliberately absent here — they live
//! behind the Verifier's `InventoryProvider` in `voyager-core`, never in the
//! Planner's tool list.

pub mod capabilities;
pub mod error;
pub mod registry;

pub use capabilities::{CurrencyCapability, DateCapability, LocationCapability};
pub use error::CapabilityError;
pub use registry::{Capability, CapabilityRegistry};
