//! API handlers for the order ledger.

pub mod client;
pub mod order;
pub mod scenario;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::services::ServiceError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// One mapping from the service taxonomy onto transport. Business-rule
/// rejections surface as 400 with their specific reason code; conflicts
/// (duplicate business key, duplicate email) as 409; store trouble as
/// 503, which callers may retry.
pub fn to_api_error(err: ServiceError) -> ApiError {
    let status = match &err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidArgument(_) | ServiceError::Rejected(_) => StatusCode::BAD_REQUEST,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{RejectReason, Role};

    #[test]
    fn status_mapping_matches_the_taxonomy() {
        let (status, body) = to_api_error(ServiceError::NotFound("x".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "NOT_FOUND");

        let (status, body) =
            to_api_error(ServiceError::Rejected(RejectReason::BecameInactive(Role::Consumer)));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "BECAME_INACTIVE");

        let (status, _) = to_api_error(ServiceError::Conflict("dup".into()));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = to_api_error(ServiceError::Unavailable("down".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
