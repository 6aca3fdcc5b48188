//! encpos-query
//!
//! Translation between the flat search query string and the backend's nested
//! query/aggregation documents: `params` parses, `builder` constructs queries,
//! `compose` reshapes backend responses, `service` runs the whole round trip.
pub mod builder;
pub mod compose;
pub mod params;
pub mod service;

pub use builder::{BackendQuery, QueryBuilder};
pub use compose::Composer;
pub use params::{parse_request, QueryParams};
pub use service::SearchService;
