//! Agent catalog: stage-grouped listing fetched once at startup.

pub mod http;
pub mod traits;

pub use http::HttpCatalogSource;
pub use traits::{Agent, CatalogIndex, CatalogSource, Stage};
