//! # Faultline API
//!
//! HTTP surface for the investigation engine. Four operations:
//! - `POST /api/v1/investigations` - run an investigation
//! - `GET  /api/v1/correlations`   - paginated correlation history
//! - `GET  /api/v1/patterns`       - mined failure patterns
//! - `POST /api/v1/feedback`       - feedback on a correlation
//!
//! plus `GET /health`. Every surfaced error carries a stable
//! machine-readable code (`invalid_argument`, `failed_precondition`,
//! `internal`) and a short operation-prefixed message.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::create_router;
