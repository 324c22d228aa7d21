//! Tenant-scoped user directory.
//!
//! Flow Overview:
//! 1) Authenticate via access token.
//! 2) Check the role capability once, at the boundary.
//! 3) Resolve the school scope and use it as a mandatory query constraint.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, Envelope};

use super::auth::{AuthState, require_auth, resolve_school_scope};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListUsersQuery {
    /// School to list; superadmins may omit it for a platform-wide view.
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListUsersResponse {
    pub users: Vec<UserSummary>,
}

#[utoipa::path(
    get,
    path = "/v1/users",
    params(
        ("school_id" = Option<Uuid>, Query, description = "School to list (superadmin only for foreign schools)")
    ),
    responses(
        (status = 200, description = "Users visible within the caller's scope", body = ListUsersResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Cross-tenant access or insufficient role")
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    Query(query): Query<ListUsersQuery>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, "/v1/users", &auth_state)?;

    if !principal.role.can_list_users() {
        return Err(ApiError::InsufficientRole);
    }

    // The resolved scope is the only school the query may touch.
    let scope = resolve_school_scope(&principal, query.school_id, false)?;

    let users = fetch_users(&pool, scope).await?;
    Ok((
        StatusCode::OK,
        Json(Envelope::ok(ListUsersResponse { users })),
    ))
}

async fn fetch_users(pool: &PgPool, school_id: Option<Uuid>) -> anyhow::Result<Vec<UserSummary>> {
    let query = match school_id {
        Some(_) => {
            "SELECT id::text AS id, email, role, school_id::text AS school_id \
             FROM users WHERE is_active = TRUE AND school_id = $1 ORDER BY email"
        }
        None => {
            "SELECT id::text AS id, email, role, school_id::text AS school_id \
             FROM users WHERE is_active = TRUE ORDER BY email"
        }
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let mut statement = sqlx::query(query);
    if let Some(school_id) = school_id {
        statement = statement.bind(school_id);
    }
    let rows = statement.fetch_all(pool).instrument(span).await?;

    Ok(rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            email: row.get("email"),
            role: row.get("role"),
            school_id: row.get("school_id"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_summary_serializes_camel_case() {
        let summary = UserSummary {
            id: "id".to_string(),
            email: "t@school.edu".to_string(),
            role: "TEACHER".to_string(),
            school_id: Some("school".to_string()),
        };
        let value = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(value["schoolId"], "school");
        assert!(value.get("school_id").is_none());
    }
}
