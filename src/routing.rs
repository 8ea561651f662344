//! Application router configuration.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{
    AppState, Error, Settings, endpoints,
    record::{
        Expense, Income, bulk_delete_records_endpoint, create_record_endpoint,
        delete_record_endpoint, get_expense_summary_endpoint, get_record_endpoint,
        list_records_endpoint, patch_record_endpoint, update_record_endpoint,
    },
    service::RecordService,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::EXPENSES,
            get(list_records_endpoint::<Expense>).post(create_record_endpoint::<Expense>),
        )
        .route(
            endpoints::EXPENSES_BULK_DELETE,
            post(bulk_delete_records_endpoint::<Expense>),
        )
        .route(endpoints::EXPENSE_SUMMARY, get(get_expense_summary_endpoint))
        .route(
            endpoints::EXPENSE,
            get(get_record_endpoint::<Expense>)
                .put(update_record_endpoint::<Expense>)
                .patch(patch_record_endpoint::<Expense>)
                .delete(delete_record_endpoint::<Expense>),
        )
        .route(
            endpoints::INCOMES,
            get(list_records_endpoint::<Income>).post(create_record_endpoint::<Income>),
        )
        .route(
            endpoints::INCOMES_BULK_DELETE,
            post(bulk_delete_records_endpoint::<Income>),
        )
        .route(
            endpoints::INCOME,
            get(get_record_endpoint::<Income>)
                .put(update_record_endpoint::<Income>)
                .patch(patch_record_endpoint::<Income>)
                .delete(delete_record_endpoint::<Income>),
        )
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::CONFIG_SHOW, get(get_config))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Report that the server is up and which storage mode it runs in.
async fn get_health(State(service): State<RecordService>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "storage_mode": service.storage_mode(),
    }))
}

/// Display the settings with the database password masked.
///
/// Only available in dev mode.
async fn get_config(
    State(settings): State<Arc<Settings>>,
    State(service): State<RecordService>,
) -> Result<Json<Value>, Error> {
    if !settings.is_dev_mode() {
        return Err(Error::NotDevMode);
    }

    Ok(Json(json!({
        "env": settings.environment,
        "database_url": settings.masked_database_url(),
        "data_dir": settings.data_dir,
        "host": settings.host,
        "port": settings.port,
        "storage_mode": service.storage_mode(),
    })))
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
