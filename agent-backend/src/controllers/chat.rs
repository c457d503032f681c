use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::controllers::authenticate;
use crate::dispatch::DispatchError;
use crate::models::Attachment;
use crate::AppState;

/// Default and maximum history page size for the transcript endpoint
const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chat").route(web::post().to(chat)))
        .service(web::resource("/api/history").route(web::get().to(get_history)));
}

async fn chat(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> impl Responder {
    let user = match authenticate(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let message = body.message.trim();
    if message.is_empty() {
        return HttpResponse::BadRequest().json(ChatResponse {
            success: false,
            reply: None,
            message_id: None,
            error: Some("Message must not be empty".to_string()),
        });
    }

    match state
        .dispatcher
        .dispatch(&user, message, &body.attachments)
        .await
    {
        Ok(result) => HttpResponse::Ok().json(ChatResponse {
            success: true,
            reply: Some(result.reply_text),
            message_id: Some(result.message_id),
            error: None,
        }),
        Err(DispatchError::RateLimited) => HttpResponse::TooManyRequests().json(ChatResponse {
            success: false,
            reply: None,
            message_id: None,
            error: Some("Too many requests. Please wait a moment and try again.".to_string()),
        }),
        Err(DispatchError::Storage(e)) => {
            log::error!("[CHAT] dispatch failed for org {}: {}", user.identity.org_id, e);
            HttpResponse::InternalServerError().json(ChatResponse {
                success: false,
                reply: None,
                message_id: None,
                error: Some("Internal server error".to_string()),
            })
        }
    }
}

async fn get_history(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let user = match authenticate(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let limit = query.limit.unwrap_or(HISTORY_LIMIT).min(HISTORY_LIMIT);
    match state.db.recent_messages(&user.identity.org_id, limit) {
        Ok(messages) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "messages": messages
        })),
        Err(e) => {
            log::error!("[CHAT] history read failed for org {}: {}", user.identity.org_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Internal server error"
            }))
        }
    }
}
