//! Read-only capabilities exposed to the Planner (spec §4.2).
//!
//! Booking/verification capabilities (flight search, hotel search) are
//! deliberately absent from this module — they live behind the Verifier's
//! `InventoryProvider` in `voyager-core`, never in the Planner's tool list.

pub mod currency;
pub mod date;
pub mod location;

pub use currency::CurrencyCapability;
pub use date::DateCapability;
pub use location::LocationCapability;
