//! Cosmos-style REST document store
//!
//! [`CosmosClient`] implements [`docpkg_core::DocumentStore`] over the
//! account REST API, signing each request with the account master key.
//!
//! # Example
//!
//! ```rust,ignore
//! use docpkg_cosmos::{CosmosClient, CosmosConfig};
//!
//! let config = CosmosConfig::from_connection_string(
//!     "AccountEndpoint=https://localhost:8081/;AccountKey=a2V5;",
//! )?;
//! let client = CosmosClient::new(config)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod auth;
mod client;
mod config;
mod error;

pub use auth::{http_date, MasterKey};
pub use client::CosmosClient;
pub use config::{CosmosConfig, DEFAULT_API_VERSION, DEFAULT_TIMEOUT};
pub use error::CosmosError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
