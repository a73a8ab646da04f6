//! Water-quality feed ingestion, safety assessment and averages.
//!
//! The binary in `main.rs` wires these modules together following the
//! Explicit Module Boundary Pattern (EMBP): each module exposes a small
//! surface and the binary only talks to those surfaces.
//!
//! - `feed`, `normalize`, `dedup`, `scheduler`: ingestion path
//! - `store`, `schema`: persistence
//! - `assessment`, `aggregation`, `service`, `upstream`: query path
//! - `routes`: HTTP gateway over `service`

pub mod aggregation;
pub mod assessment;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod service;
pub mod store;
pub mod upstream;

pub use config::Config;
pub use models::{Measurements, Parameter, Reading, TimestampSource};
pub use service::WaterQualityService;
