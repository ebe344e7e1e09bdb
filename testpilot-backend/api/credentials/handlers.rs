/// Test-site credential bags. Secret values go in through `add` and are
/// only ever handed to the browser agent; no endpoint returns them.
///
/// POST   /api/credentials/add             — store or replace a bag
/// GET    /api/credentials/list            — patterns and field names
/// GET    /api/credentials/lookup?domain=  — which pattern applies
/// DELETE /api/credentials/{domain}        — drop a bag
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::api::response::{ApiError, ApiResult, success};
use crate::credentials::SecretFields;

#[derive(Deserialize)]
pub(crate) struct AddCredentialsBody {
    pub domain: String,
    pub credentials: SecretFields,
}

#[derive(Deserialize)]
pub(crate) struct LookupQuery {
    pub domain: String,
}

pub(crate) async fn add_credentials(
    State(state): State<AppState>,
    Json(body): Json<AddCredentialsBody>,
) -> ApiResult {
    if body.credentials.is_empty() {
        return Err(ApiError::bad_request("credentials must contain at least one field"));
    }
    let fields: Vec<String> = body.credentials.keys().cloned().collect();
    let pattern = state.credentials.add(&body.domain, body.credentials)?;
    Ok(success(json!({
        "message": format!("Credentials stored for {pattern}"),
        "pattern": pattern,
        "fields": fields,
    })))
}

pub(crate) async fn list_credentials(State(state): State<AppState>) -> ApiResult {
    let records = state.credentials.list();
    Ok(success(json!({
        "total": records.len(),
        "credentials": records,
    })))
}

pub(crate) async fn lookup_credentials(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ApiResult {
    let found = state.credentials.lookup(&query.domain)?;
    let fields: Vec<String> = found.fields.into_keys().collect();
    let placeholders: Vec<String> = fields
        .iter()
        .map(|f| format!("{{{{credential.{f}}}}}"))
        .collect();
    Ok(success(json!({
        "domain": query.domain,
        "pattern": found.pattern,
        "fields": fields,
        "placeholders": placeholders,
    })))
}

pub(crate) async fn remove_credentials(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> ApiResult {
    let pattern = state.credentials.remove(&domain)?;
    Ok(success(json!({
        "message": format!("Credentials removed for {pattern}"),
        "pattern": pattern,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::testing::{bare_state, delete, get, post_json, send};

    #[tokio::test]
    async fn add_then_lookup_subdomain() {
        let state = bare_state();
        let (status, body) = send(
            state.clone(),
            post_json(
                "/api/credentials/add",
                json!({
                    "domain": "https://example.com",
                    "credentials": { "username": "alice", "password": "hunter2" },
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pattern"], "*.example.com");

        let (status, body) = send(
            state.clone(),
            get("/api/credentials/lookup?domain=www.example.com"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pattern"], "*.example.com");
        assert_eq!(body["fields"], json!(["password", "username"]));
        assert_eq!(body["placeholders"][1], "{{credential.username}}");
        assert!(!body.to_string().contains("hunter2"));

        let (status, _) = send(state, get("/api/credentials/lookup?domain=other.com")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_hides_values() {
        let state = bare_state();
        send(
            state.clone(),
            post_json(
                "/api/credentials/add",
                json!({ "domain": "shop.test", "credentials": { "pin": "1234" } }),
            ),
        )
        .await;
        let (_, body) = send(state, get("/api/credentials/list")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["credentials"][0]["fields"], json!(["pin"]));
        assert!(!body.to_string().contains("1234"));
    }

    #[tokio::test]
    async fn remove_unknown_is_404() {
        let state = bare_state();
        let (status, _) = send(state.clone(), delete("/api/credentials/example.com")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(
            state.clone(),
            post_json(
                "/api/credentials/add",
                json!({ "domain": "example.com", "credentials": { "u": "a" } }),
            ),
        )
        .await;
        let (status, body) = send(state, delete("/api/credentials/example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pattern"], "*.example.com");
    }

    #[tokio::test]
    async fn empty_bag_is_rejected() {
        let (status, _) = send(
            bare_state(),
            post_json("/api/credentials/add", json!({ "domain": "x.test", "credentials": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
