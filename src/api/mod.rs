//! Thin HTTP translator over the workflow engine: one endpoint per
//! declared workflow, plus debug passthroughs for workers and
//! retrieval, and a health check.

mod dto;
mod error;
mod routes;

pub use dto::{
    HealthResponse, IngestFileDto, PresentationRequest, PresentationResponse, RetrieveRequest, RetrieveResponse,
};
pub use error::{ApiError, ApiErrorBody};
pub use routes::{build_router, AppState};
