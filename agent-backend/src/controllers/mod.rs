pub mod chat;
pub mod health;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::models::AuthedUser;
use crate::AppState;

/// Shared bearer-token authentication for controller handlers.
///
/// Resolves the Authorization header against the session store and hands
/// back the caller's tenant identity. Every org-scoped route goes through
/// this before touching data.
pub fn authenticate(
    state: &web::Data<AppState>,
    req: &HttpRequest,
) -> Result<AuthedUser, HttpResponse> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_string());

    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "No authorization token provided"
            })));
        }
    };

    match state.db.resolve_identity(&token) {
        Ok(Some(user)) if user.identity.org_id.is_empty() => {
            Err(HttpResponse::Forbidden().json(serde_json::json!({
                "error": "No organization associated with this account"
            })))
        }
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid or expired session"
        }))),
        Err(e) => {
            log::error!("[AUTH] session lookup failed: {}", e);
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })))
        }
    }
}
