//! Record creation endpoint.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    endpoints::{self, format_endpoint},
    record::{Entry, EntryKind, EntryPayload, JsonBody},
    service::RecordService,
};

/// Handle a request to create a record of kind `E`.
///
/// Responds with 201, the URI of the new record in the `Location` header and
/// `{"status": "created", "<kind>": record}`.
pub async fn create_record_endpoint<E: Entry>(
    State(service): State<RecordService>,
    JsonBody(payload): JsonBody<EntryPayload>,
) -> Result<Response, Error> {
    let record = service.add::<E>(payload)?;

    let record_endpoint = match E::KIND {
        EntryKind::Expense => endpoints::EXPENSE,
        EntryKind::Income => endpoints::INCOME,
    };

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format_endpoint(record_endpoint, record.id))],
        Json(record.response_body("created")),
    )
        .into_response())
}

#[cfg(test)]
mod create_record_endpoint_tests {
    use axum::{body::to_bytes, extract::State, http::StatusCode, response::IntoResponse};
    use serde_json::{Value, json};

    use crate::{
        Error,
        flags::EnvOverrides,
        record::{EntryPayload, Expense, Income, JsonBody, create_record_endpoint},
        service::test_utils::get_test_service,
    };

    #[tokio::test]
    async fn create_expense_returns_created_record() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let payload: EntryPayload = serde_json::from_value(json!({
            "date": "2025-01-01",
            "business": "SuperSal",
            "category": "Groceries",
            "amount": "42.50",
            "account": "Cash"
        }))
        .unwrap();

        let response =
            create_record_endpoint::<Expense>(State(service.clone()), JsonBody(payload))
                .await
                .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["location"], "/api/v1/expense/1");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "created");
        assert_eq!(body["expense"]["currency"], "₪");
        assert_eq!(body["expense"]["amount"], json!(42.5));
        assert_eq!(service.list::<Expense>().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_income_without_category_is_rejected() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let payload: EntryPayload = serde_json::from_value(json!({
            "date": "2025-11-01",
            "amount": 8200,
            "account": "Bank Leumi"
        }))
        .unwrap();

        let result = create_record_endpoint::<Income>(State(service), JsonBody(payload)).await;

        let error = result.unwrap_err();
        assert_eq!(error, Error::MissingField("category"));
        assert_eq!(
            error.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
