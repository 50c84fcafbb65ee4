//! Hoststat directory - catalog of monitorable hosts behind a small REST API
//!
//! The viewer lists hosts from here at startup and collectors register
//! themselves here to learn the topic they publish on.

pub mod config;
pub mod directory;
pub mod http;
mod state;

pub use config::DirectoryConfig;
pub use directory::{Directory, DirectoryError};
