//! Management action queries.

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};
use vespawatch_database_models::{ManagementActionRow, NewManagementAction, Scope};
use vespawatch_observation_models::{ActionProblem, ActionResult, Choice};

use crate::DbError;
use crate::sql::{SqlBuilder, opt_i32, opt_i64, opt_string, utc};

const SELECT_ACTIONS: &str = "SELECT a.id, a.nest_id, a.user_id, u.username,
        a.action_time, a.duration_minutes, a.number_of_persons, a.comments,
        a.result, a.method, a.product, a.aftercare, a.nest_site, a.nest_type,
        a.problems
 FROM management_actions a
 JOIN observations o ON o.id = a.nest_id
 LEFT JOIN users u ON u.id = a.user_id
 WHERE 1=1";

fn parse_code<C: Choice>(row: &Row, column: &str) -> Option<C> {
    let code: Option<String> = row.to_value(column).unwrap_or(None);
    code.as_deref().and_then(C::from_code)
}

fn action_from_row(row: &Row) -> ManagementActionRow {
    let problems: String = row.to_value("problems").unwrap_or_default();

    ManagementActionRow {
        id: row.to_value("id").unwrap_or(0),
        nest_id: row.to_value("nest_id").unwrap_or(0),
        user_id: row.to_value("user_id").unwrap_or(None),
        username: row.to_value("username").unwrap_or(None),
        action_time: utc(row.to_value("action_time").unwrap_or_default()),
        duration_minutes: row.to_value("duration_minutes").unwrap_or(None),
        number_of_persons: row.to_value("number_of_persons").unwrap_or(None),
        comments: row.to_value("comments").unwrap_or_default(),
        result: parse_code(row, "result").unwrap_or(ActionResult::Unknown),
        method: parse_code(row, "method"),
        product: parse_code(row, "product"),
        aftercare: parse_code(row, "aftercare"),
        nest_site: parse_code(row, "nest_site"),
        nest_type: parse_code(row, "nest_type"),
        problems: ActionProblem::decode_list(&problems),
    }
}

fn action_params(action: &NewManagementAction) -> Vec<DatabaseValue> {
    vec![
        DatabaseValue::Int64(action.nest_id),
        opt_i64(action.user_id),
        DatabaseValue::DateTime(action.action_time.naive_utc()),
        opt_i32(action.duration_minutes),
        opt_i32(action.number_of_persons),
        DatabaseValue::String(action.comments.clone()),
        DatabaseValue::String(action.result.code().to_string()),
        opt_string(action.method.map(Choice::code)),
        opt_string(action.product.map(Choice::code)),
        opt_string(action.aftercare.map(Choice::code)),
        opt_string(action.nest_site.map(Choice::code)),
        opt_string(action.nest_type.map(Choice::code)),
        DatabaseValue::String(ActionProblem::encode_list(&action.problems)),
    ]
}

/// Fetches one action by ID if its nest is visible under `scope`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_action(
    db: &dyn Database,
    id: i64,
    scope: Scope,
) -> Result<Option<ManagementActionRow>, DbError> {
    let mut b = SqlBuilder::new(SELECT_ACTIONS);
    b.and("a.id", "=", DatabaseValue::Int64(id));
    crate::observations::apply_scope(&mut b, scope);

    let rows = db.query_raw_params(b.sql(), b.params()).await?;
    Ok(rows.first().map(action_from_row))
}

/// Fetches the action recorded for a nest, if any.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_action_for_nest(
    db: &dyn Database,
    nest_id: i64,
) -> Result<Option<ManagementActionRow>, DbError> {
    let mut b = SqlBuilder::new(SELECT_ACTIONS);
    b.and("a.nest_id", "=", DatabaseValue::Int64(nest_id));

    let rows = db.query_raw_params(b.sql(), b.params()).await?;
    Ok(rows.first().map(action_from_row))
}

/// Lists every action visible under `scope`, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_actions(
    db: &dyn Database,
    scope: Scope,
) -> Result<Vec<ManagementActionRow>, DbError> {
    let mut b = SqlBuilder::new(SELECT_ACTIONS);
    crate::observations::apply_scope(&mut b, scope);
    b.push(" ORDER BY a.action_time DESC, a.id DESC");

    let rows = db.query_raw_params(b.sql(), b.params()).await?;
    Ok(rows.iter().map(action_from_row).collect())
}

/// Inserts an action for a nest.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the target is not a nest or already has
/// an action, or [`DbError`] if the database operation fails.
pub async fn insert_action(
    db: &dyn Database,
    action: &NewManagementAction,
) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO management_actions (
                nest_id, user_id, action_time, duration_minutes, number_of_persons,
                comments, result, method, product, aftercare, nest_site, nest_type, problems
             )
             SELECT $1::BIGINT, $2::BIGINT, $3::TIMESTAMP, $4::INTEGER, $5::INTEGER,
                    $6::TEXT, $7::TEXT, $8::TEXT, $9::TEXT, $10::TEXT, $11::TEXT, $12::TEXT,
                    $13::TEXT
             WHERE EXISTS (SELECT 1 FROM observations WHERE id = $1 AND kind = 'NEST')
             ON CONFLICT (nest_id) DO NOTHING
             RETURNING id",
            &action_params(action),
        )
        .await?;

    if rows.is_empty() {
        return Err(DbError::Conflict {
            message: format!(
                "Nest {} does not exist or already has a management action",
                action.nest_id
            ),
        });
    }

    crate::returned_id(&rows, "management action")
}

/// Replaces the fields of an existing action. The nest and author are kept.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_action(
    db: &dyn Database,
    id: i64,
    action: &NewManagementAction,
) -> Result<u64, DbError> {
    let mut params = action_params(action);
    // nest_id and user_id are not updatable
    params.drain(0..2);
    params.push(DatabaseValue::Int64(id));

    Ok(db
        .exec_raw_params(
            "UPDATE management_actions SET
                action_time = $1, duration_minutes = $2, number_of_persons = $3,
                comments = $4, result = $5, method = $6, product = $7,
                aftercare = $8, nest_site = $9, nest_type = $10, problems = $11
             WHERE id = $12",
            &params,
        )
        .await?)
}

/// Deletes an action.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn delete_action(db: &dyn Database, id: i64) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "DELETE FROM management_actions WHERE id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?)
}
