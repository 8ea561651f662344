//! Record deletion endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error,
    record::{Entry, JsonBody, RecordId},
    service::RecordService,
};

/// The body of a bulk delete request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkDeleteRequest {
    /// The IDs of the records to delete. IDs that do not exist are skipped.
    pub ids: Vec<RecordId>,
}

/// Handle a request to delete a record of kind `E`.
pub async fn delete_record_endpoint<E: Entry>(
    Path(id): Path<RecordId>,
    State(service): State<RecordService>,
) -> Result<Json<Value>, Error> {
    service.remove::<E>(id)?;

    Ok(Json(json!({ "status": "deleted", "id": id })))
}

/// Handle a request to delete many records of kind `E` at once.
///
/// Responds with how many of the records existed.
pub async fn bulk_delete_records_endpoint<E: Entry>(
    State(service): State<RecordService>,
    JsonBody(request): JsonBody<BulkDeleteRequest>,
) -> Result<Json<Value>, Error> {
    let count = service.bulk_remove::<E>(&request.ids)?;

    Ok(Json(json!({ "status": "deleted", "count": count })))
}

#[cfg(test)]
mod delete_record_endpoint_tests {
    use axum::{
        Json,
        extract::{Path, State},
    };
    use serde_json::json;
    use time::macros::date;

    use crate::{
        Error,
        flags::EnvOverrides,
        record::{
            Expense, JsonBody, bulk_delete_records_endpoint, delete_record_endpoint, test_expense,
        },
        service::test_utils::get_test_service,
    };

    use super::BulkDeleteRequest;

    #[tokio::test]
    async fn delete_record_succeeds() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let created = service
            .controller()
            .create(test_expense(date!(2025 - 01 - 01), "Groceries", "42.50"))
            .unwrap();

        let Json(body) = delete_record_endpoint::<Expense>(Path(created.id), State(service.clone()))
            .await
            .unwrap();

        assert_eq!(body, json!({"status": "deleted", "id": created.id}));
        assert!(service.list::<Expense>().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_with_invalid_id_is_not_found() {
        let (_dir, service) = get_test_service(EnvOverrides::default());

        let result = delete_record_endpoint::<Expense>(Path(999999), State(service)).await;

        assert_eq!(result.unwrap_err(), Error::NotFound);
    }

    #[tokio::test]
    async fn bulk_delete_returns_count_of_existing_records() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let controller = service.controller();
        let ids: Vec<_> = (0..3)
            .map(|_| {
                controller
                    .create(test_expense(date!(2025 - 01 - 01), "Groceries", "1"))
                    .unwrap()
                    .id
            })
            .collect();
        let request = BulkDeleteRequest {
            ids: vec![ids[0], ids[1], 999999],
        };

        let Json(body) =
            bulk_delete_records_endpoint::<Expense>(State(service.clone()), JsonBody(request))
                .await
                .unwrap();

        assert_eq!(body, json!({"status": "deleted", "count": 2}));
        let remaining: Vec<_> = service
            .list::<Expense>()
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(remaining, vec![ids[2]]);
    }
}
