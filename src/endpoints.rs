//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g. '/api/v1/expense/{id}', use
//! [format_endpoint].

/// The route to list and create expenses.
pub const EXPENSES: &str = "/api/v1/expense";
/// The route to read, update and delete a single expense.
pub const EXPENSE: &str = "/api/v1/expense/{id}";
/// The route to delete many expenses at once.
pub const EXPENSES_BULK_DELETE: &str = "/api/v1/expense/bulk-delete";
/// The route to summarize all expenses.
pub const EXPENSE_SUMMARY: &str = "/api/v1/expense/summary";
/// The route to list and create incomes.
pub const INCOMES: &str = "/api/v1/income";
/// The route to read, update and delete a single income.
pub const INCOME: &str = "/api/v1/income/{id}";
/// The route to delete many incomes at once.
pub const INCOMES_BULK_DELETE: &str = "/api/v1/income/bulk-delete";
/// The route for checking that the server is up.
pub const HEALTH: &str = "/api/v1/health";
/// The route for displaying the configuration in dev mode.
pub const CONFIG_SHOW: &str = "/api/v1/config/show";

/// Replace the first `{parameter}` in `endpoint_path` with `id`.
///
/// If `endpoint_path` has no parameter it is returned unchanged.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };
    let end = endpoint_path[start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| start + offset + 1);

    format!("{}{id}{}", &endpoint_path[..start], &endpoint_path[end..])
}
