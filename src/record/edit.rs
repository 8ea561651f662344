//! Record update endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;

use crate::{
    Error,
    record::{Entry, EntryPayload, FieldUpdate, JsonBody, RecordId},
    service::RecordService,
};

/// Handle a PUT request for a record of kind `E`.
///
/// Only the fields present in the payload are changed.
pub async fn update_record_endpoint<E: Entry>(
    Path(id): Path<RecordId>,
    State(service): State<RecordService>,
    JsonBody(payload): JsonBody<EntryPayload>,
) -> Result<Json<Value>, Error> {
    let record = service.update::<E>(id, payload)?;

    Ok(Json(record.response_body("updated")))
}

/// Handle a PATCH request that changes a single field, e.g.
/// `{"field": "category", "value": "Dining"}`.
pub async fn patch_record_endpoint<E: Entry>(
    Path(id): Path<RecordId>,
    State(service): State<RecordService>,
    JsonBody(update): JsonBody<FieldUpdate>,
) -> Result<Json<Value>, Error> {
    let record = service.update_field::<E>(id, update)?;

    Ok(Json(record.response_body("updated")))
}
