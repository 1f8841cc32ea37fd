#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::struct_field_names
)]

pub mod app;
pub mod auth;
pub mod cli;
pub mod completion;
pub mod config;
pub mod content;
pub mod error;
pub mod persona;
pub mod pipeline;
pub mod scrub;
pub mod store;
pub mod workflow;

pub use cli::Cli;
pub use config::Config;
pub use error::EchoquillError;
