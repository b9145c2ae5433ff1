//! Market data aggregate: value objects, candle entities, validation and the
//! streaming aggregator.

pub mod aggregator;
pub mod entities;
pub mod indicator_engine;
pub mod services;
pub mod value_objects;

pub use aggregator::*;
pub use entities::*;
pub use indicator_engine::*;
pub use services::*;
pub use value_objects::*;
