pub mod aggregator;
pub mod geo;
pub mod lookup;
pub mod merge;
pub mod renderer;
pub mod source;

pub use aggregator::{FlightAggregator, QueryError};
pub use renderer::render;
