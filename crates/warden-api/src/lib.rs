//! Administrative REST API for the Warden VPN control plane.
//!
//! Everything lives under `/api/v1`. The auth routes are public; the
//! rest sits behind a bearer-token layer that attaches validated
//! claims to the request. Responses are JSON except the client config
//! (plain text) and the PNG form of the QR endpoint.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::ApiServer;
pub use state::{ApiSettings, ApiState};
