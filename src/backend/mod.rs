//! Clients for the external conversation services.

pub mod http;
pub mod traits;

pub use http::HttpChatBackend;
pub use traits::ChatBackend;
