//! Price observation layer.
//!
//! Each attestation round reads the same asset from at least two
//! independent feeds. Agreement between the readings is enforced later by
//! the consensus builder, not here.

pub mod collector;
pub mod sources;

pub use collector::SourceCollector;
pub use sources::{unix_now, PriceObservation, PriceSource, SourceId, StaticPriceSource};
