//! Operation API Handlers
//!
//! The lookup endpoint for tracked operations, plus the shared logic every
//! submitting route uses to answer: wait briefly for the outcome, or hand
//! the operation handle back with `202 Accepted`.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use harbor_core::domain::operation::{OperationHandle, OperationOutcome};
use harbor_core::dto::operation::{OperationProgress, SubmitMode};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::table::Lookup;

/// GET /operations/{id}
/// Current status of a tracked operation
///
/// Idempotent: a resolved operation answers with the same outcome until it
/// is evicted.
pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let handle = OperationHandle::new(id);
    tracing::debug!("Looking up operation: {}", handle);

    let lookup = state.poller.table().lookup(&handle).await?;
    Ok(lookup_response(handle, lookup))
}

/// Answers a submitting request for `handle`
pub async fn respond_tracked(
    state: &AppState,
    handle: OperationHandle,
    mode: SubmitMode,
) -> ApiResult<Response> {
    match mode {
        SubmitMode::Async => Ok(accepted(OperationProgress::running(handle))),
        SubmitMode::Sync => {
            let lookup = state
                .poller
                .table()
                .wait_for(&handle, state.sync_wait)
                .await?;
            Ok(lookup_response(handle, lookup))
        }
    }
}

fn lookup_response(handle: OperationHandle, lookup: Lookup) -> Response {
    match lookup {
        Lookup::Resolved(outcome) => outcome_response(outcome),
        Lookup::InFlight {
            current,
            last_polled_at,
            ..
        } => accepted(OperationProgress {
            current: (current != handle).then_some(current),
            last_polled_at,
            ..OperationProgress::running(handle)
        }),
    }
}

/// `202 Accepted` pointing at the lookup endpoint
///
/// The `Location` header is what tells an in-flight answer apart from a
/// resolved outcome whose own code happens to be 202.
pub fn accepted(progress: OperationProgress) -> Response {
    let location = format!("/operations/{}", progress.operation_id);
    (
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(progress),
    )
        .into_response()
}

/// The resolved `{code, body}` as an HTTP response
pub fn outcome_response(outcome: OperationOutcome) -> Response {
    let status = StatusCode::from_u16(outcome.code).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(outcome.body)).into_response()
}
