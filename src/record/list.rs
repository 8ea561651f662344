//! Endpoints for reading records.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    Error,
    record::{Entry, Record, RecordId},
    service::{ExpenseSummary, RecordService},
};

/// Respond with every record of kind `E` as a JSON array, ordered by ID.
pub async fn list_records_endpoint<E: Entry>(
    State(service): State<RecordService>,
) -> Result<Json<Vec<Record<E>>>, Error> {
    service.list().map(Json)
}

/// Respond with a single record of kind `E`.
pub async fn get_record_endpoint<E: Entry>(
    Path(id): Path<RecordId>,
    State(service): State<RecordService>,
) -> Result<Json<Record<E>>, Error> {
    service.get(id).map(Json)
}

/// Respond with the total and count of all expenses.
pub async fn get_expense_summary_endpoint(
    State(service): State<RecordService>,
) -> Result<Json<ExpenseSummary>, Error> {
    service.expense_summary().map(Json)
}

#[cfg(test)]
mod list_records_endpoint_tests {
    use axum::{
        Json,
        extract::{Path, State},
    };
    use time::macros::date;

    use crate::{
        Error,
        flags::EnvOverrides,
        record::{
            Income, get_expense_summary_endpoint, get_record_endpoint, list_records_endpoint,
            test_expense, test_income,
        },
        service::test_utils::get_test_service,
    };

    #[tokio::test]
    async fn list_returns_records_in_id_order() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let controller = service.controller();
        let first = controller
            .create(test_income(date!(2025 - 11 - 15), "Freelance", "1250"))
            .unwrap();
        let second = controller
            .create(test_income(date!(2025 - 11 - 01), "Salary", "8200"))
            .unwrap();

        let Json(records) = list_records_endpoint::<Income>(State(service.clone()))
            .await
            .unwrap();

        assert_eq!(records, vec![first, second]);
    }

    #[tokio::test]
    async fn get_returns_record() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let created = service
            .controller()
            .create(test_income(date!(2025 - 11 - 01), "Salary", "8200"))
            .unwrap();

        let Json(record) = get_record_endpoint::<Income>(Path(created.id), State(service.clone()))
            .await
            .unwrap();

        assert_eq!(record, created);
    }

    #[tokio::test]
    async fn get_with_invalid_id_is_not_found() {
        let (_dir, service) = get_test_service(EnvOverrides::default());

        let result = get_record_endpoint::<Income>(Path(1), State(service)).await;

        assert_eq!(result.unwrap_err(), Error::NotFound);
    }

    #[tokio::test]
    async fn summary_totals_expenses() {
        let (_dir, service) = get_test_service(EnvOverrides::default());
        let controller = service.controller();
        controller
            .create(test_expense(date!(2025 - 11 - 01), "Groceries", "142.50"))
            .unwrap();
        controller
            .create(test_expense(date!(2025 - 11 - 03), "Transport", "15"))
            .unwrap();

        let Json(summary) = get_expense_summary_endpoint(State(service)).await.unwrap();

        assert_eq!(summary.total.to_string(), "157.50");
        assert_eq!(summary.count, 2);
    }
}
