// ==========================================
// Roofline Ops - API layer
// ==========================================

pub mod error;
pub mod portal_api;

pub use error::{ApiError, ApiResult};
pub use portal_api::{OrderSubmission, PortalApi};
