//! # Docstore API
//!
//! The HTTP layer shared by the SBOM and VEX services: the ingestion
//! gateway (`POST /api/v1/{sbom|vex}`), direct lookups served straight
//! from the content store (`GET /api/v1/{sbom|vex}?id=`), and indexed
//! search served from an atomically refreshed, immutable index handle
//! (`GET /api/v1/{sbom|vex}/search?q=`).

pub mod auth;
pub mod errors;
pub mod ingest;
pub mod query;
pub mod refresh;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AuthError, Authenticator, NoopAuthenticator, Principal};
pub use errors::ApiError;
pub use refresh::{spawn_refresh, LoadedIndex, SearchHandles};
pub use router::build_router;
pub use state::{ApiConfig, AppState};
