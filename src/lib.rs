#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::uninlined_format_args
)]

pub mod backend;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{BackendError, CatalogError, ChannelError, SessionError};
