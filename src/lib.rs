//! # cloudnet
//!
//! Networking and session layer for the Cloud mobile apps.
//!
//! `cloudnet` sits between app features and the backend: it keeps the cookie
//! jar on durable storage, stamps every request with the base parameters and
//! session header, notices when the server has logged the user out, and wraps
//! API calls in result envelopes with exponential backoff.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloudnet::config::NetworkConfig;
//! use cloudnet::context::NetworkContext;
//! use cloudnet::http::RetryConfig;
//! use cloudnet::service::ServiceDescriptor;
//! use cloudnet::storage::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cloudnet::base::neterror::NetError> {
//!     cloudnet::logging::init("cloudnet=info");
//!
//!     let storage = Arc::new(SqliteStore::open("prefs.db", "app")?);
//!     let context = NetworkContext::new(NetworkConfig::default(), storage);
//!     context.subscribe_session_expiration(Arc::new(|| println!("logged out")));
//!
//!     let api = context.generate_service(
//!         ServiceDescriptor::parse("https://api.example.com/v1/")?.session_expiration(true),
//!     );
//!     let result = api
//!         .get("profile")
//!         .call_with_retries::<serde_json::Value>(&RetryConfig::default())
//!         .await;
//!     result.on_error(|e| eprintln!("{}", e));
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes and IO error context
//! - [`storage`] - Durable key-value backends
//! - [`cookies`] - Cookie model, persistent store and manager
//! - [`session`] - Base parameters and session expiration detection
//! - [`http`] - Request/response models, pipeline, transport, safe API calls
//! - [`socket`] - Connect job and BoringSSL settings
//! - [`interceptors`] - Pipeline stages
//! - [`service`] - Per-backend clients
//! - [`context`] - Shared state behind every service

pub mod base;
pub mod config;
pub mod context;
pub mod cookies;
pub mod http;
pub mod interceptors;
pub mod logging;
pub mod service;
pub mod session;
pub mod socket;
pub mod storage;

pub use base::neterror::NetError;
pub use context::NetworkContext;
pub use crate::http::apicall::{ApiError, ApiResult};
pub use service::{ServiceClient, ServiceDescriptor};
