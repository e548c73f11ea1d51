//! REST backend for converge
//!
//! Implements [`converge_cloud::Accessor`] and [`converge_cloud::Mutator`] over
//! a JSON REST API: `GET`/`PATCH`/`DELETE {base}/{collection}/{id}` and
//! `POST {base}/{collection}`. HTTP 404 is reported as the not-found signal the
//! reconciliation engine relies on during deletes.
//!
//! # Example
//!
//! ```ignore
//! use converge_cloud::{ResourceController, ResourceKind};
//! use converge_cloud_http::{HttpBackend, HttpConfig};
//! use std::sync::Arc;
//!
//! let backend = HttpBackend::new(HttpConfig::new("https://api.example.com").with_token(token))?;
//! let controller = ResourceController::for_kind(Arc::new(backend), ResourceKind::Vpc);
//! ```

pub mod backend;
pub mod endpoint;
pub mod error;

pub use backend::{HttpBackend, HttpConfig};
pub use endpoint::Endpoint;
pub use error::{HttpError, Result};
