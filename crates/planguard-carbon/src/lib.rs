//! Planguard Carbon - Region carbon intensity and power modelling
//!
//! Carbon intensity is queried per (provider, region) in gCO₂e/kWh. The
//! static table ships approximate grid figures; a remote store can implement
//! the same trait. The power model converts component usage into kWh so the
//! aggregator can do `kWh × intensity / 1000 → kg CO₂e`.

#![deny(unsafe_code)]

mod power;
mod store;

pub use power::{storage_kwh_per_gb_month, PowerModel};
pub use store::{CarbonError, CarbonStore, StaticCarbonStore, DEFAULT_INTENSITY};
