//! REST API handlers for the chat service

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use bloxtrade_core::{
    Chat, ChatId, FileInfo, Message, MessageId, MessageType, ParticipantRole, UserId,
};

use crate::auth::{authenticate, TokenRegistry};
use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::service::{ChatService, GroupUpdate, SendMessage};

/// Shared application state
pub struct AppState {
    /// Chat service
    pub service: Arc<ChatService>,
    /// Bearer token registry
    pub auth: Arc<TokenRegistry>,
    /// Service configuration
    pub config: ServiceConfig,
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health))
            .route("/session", web::post().to(create_session))
            .route("/chats", web::get().to(list_chats))
            .route("/chats/direct", web::post().to(create_direct))
            .route("/chats/group", web::post().to(create_group))
            .route("/chats/{chat_id}", web::get().to(get_chat))
            .route("/chats/{chat_id}", web::put().to(update_group))
            .route("/chats/{chat_id}", web::delete().to(delete_chat))
            .route(
                "/chats/{chat_id}/participants",
                web::post().to(add_participant),
            )
            .route(
                "/chats/{chat_id}/participants/{user_id}",
                web::delete().to(remove_participant),
            )
            .route(
                "/chats/{chat_id}/participants/{user_id}/role",
                web::put().to(update_role),
            )
            .route("/chats/{chat_id}/messages", web::get().to(list_messages))
            .route("/chats/{chat_id}/messages", web::post().to(send_message))
            .route(
                "/chats/{chat_id}/messages/{message_id}",
                web::put().to(edit_message),
            )
            .route(
                "/chats/{chat_id}/messages/{message_id}",
                web::delete().to(delete_message),
            )
            .route(
                "/chats/{chat_id}/messages/{message_id}/reactions",
                web::post().to(add_reaction),
            )
            .route(
                "/chats/{chat_id}/messages/{message_id}/reactions/{emoji}",
                web::delete().to(remove_reaction),
            )
            .route(
                "/notifications/unread-count/total",
                web::get().to(unread_count),
            ),
    );
}

fn parse_chat_id(raw: &str) -> Result<ChatId, ApiError> {
    let id = ChatId::from_string(raw);
    if !id.is_valid() {
        return Err(ApiError::BadRequest(format!("invalid chat id: {}", raw)));
    }
    Ok(id)
}

fn parse_message_id(raw: &str) -> Result<MessageId, ApiError> {
    let id = MessageId::from_string(raw);
    if !id.is_valid() {
        return Err(ApiError::BadRequest(format!("invalid message id: {}", raw)));
    }
    Ok(id)
}

/// List query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum items to return
    pub limit: Option<usize>,
}

/// Session creation request (stand-in for the marketplace auth stack)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: String,
}

/// Session creation response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
}

/// Direct chat creation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectRequest {
    pub other_user_id: String,
}

/// Group chat creation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub participant_ids: Vec<String>,
}

/// Group metadata update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub allow_member_invites: Option<bool>,
}

/// Participant addition request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantRequest {
    pub user_id: String,
}

/// Role update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role: ParticipantRole,
}

/// Message send request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
    pub file_info: Option<FileInfo>,
    pub reply_to: Option<String>,
}

/// Message edit request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub content: String,
}

/// Reaction request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub emoji: String,
}

/// Chat list response
#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<Chat>,
}

/// Single chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: Chat,
}

/// Message list response
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

/// Single message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

/// Unread count response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub total_unread_count: u64,
    pub chat_count: usize,
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn create_session(
    state: web::Data<AppState>,
    body: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.user_id.is_empty() {
        return Err(ApiError::BadRequest("userId is empty".to_string()));
    }
    let user_id = UserId::from_string(body.user_id.clone());
    let token = state.auth.issue(user_id.clone());
    info!(user = %user_id, "session issued");
    Ok(HttpResponse::Ok().json(SessionResponse {
        token,
        user_id: user_id.to_string(),
    }))
}

async fn list_chats(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let limit = state.config.clamp_limit(query.limit);
    let chats = state.service.list_chats(&caller, limit)?;
    Ok(HttpResponse::Ok().json(ChatListResponse { chats }))
}

async fn create_direct(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateDirectRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    if body.other_user_id.is_empty() {
        return Err(ApiError::BadRequest("otherUserId is empty".to_string()));
    }
    let other = UserId::from_string(body.other_user_id.clone());
    let (chat, created) = state.service.create_direct(&caller, &other)?;
    let response = ChatResponse { chat };
    if created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

async fn create_group(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let participants = body
        .participant_ids
        .iter()
        .map(|s| UserId::from_string(s.clone()))
        .collect();
    let chat = state.service.create_group(&caller, &body.name, participants)?;
    Ok(HttpResponse::Created().json(ChatResponse { chat }))
}

async fn get_chat(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let chat_id = parse_chat_id(&path)?;
    let chat = state.service.get_chat(&caller, &chat_id)?;
    Ok(HttpResponse::Ok().json(ChatResponse { chat }))
}

async fn update_group(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let chat_id = parse_chat_id(&path)?;
    let body = body.into_inner();
    let chat = state.service.update_group(
        &caller,
        &chat_id,
        GroupUpdate {
            name: body.name,
            avatar_url: body.avatar_url,
            allow_member_invites: body.allow_member_invites,
        },
    )?;
    Ok(HttpResponse::Ok().json(ChatResponse { chat }))
}

async fn delete_chat(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let chat_id = parse_chat_id(&path)?;
    state.service.delete_chat(&caller, &chat_id)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn add_participant(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<AddParticipantRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let chat_id = parse_chat_id(&path)?;
    if body.user_id.is_empty() {
        return Err(ApiError::BadRequest("userId is empty".to_string()));
    }
    let chat = state.service.add_participant(
        &caller,
        &chat_id,
        UserId::from_string(body.user_id.clone()),
    )?;
    Ok(HttpResponse::Ok().json(ChatResponse { chat }))
}

async fn remove_participant(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let (chat_id, user_id) = path.into_inner();
    let chat_id = parse_chat_id(&chat_id)?;
    let chat = state
        .service
        .remove_participant(&caller, &chat_id, &UserId::from_string(user_id))?;
    Ok(HttpResponse::Ok().json(ChatResponse { chat }))
}

async fn update_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let (chat_id, user_id) = path.into_inner();
    let chat_id = parse_chat_id(&chat_id)?;
    let chat = state.service.set_role(
        &caller,
        &chat_id,
        &UserId::from_string(user_id),
        body.role,
    )?;
    Ok(HttpResponse::Ok().json(ChatResponse { chat }))
}

async fn list_messages(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let chat_id = parse_chat_id(&path)?;
    let limit = state.config.clamp_limit(query.limit);
    let messages = state.service.list_messages(&caller, &chat_id, limit)?;
    Ok(HttpResponse::Ok().json(MessageListResponse { messages }))
}

async fn send_message(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let chat_id = parse_chat_id(&path)?;
    let body = body.into_inner();
    let reply_to = body.reply_to.map(|raw| parse_message_id(&raw)).transpose()?;
    let message = state.service.send_message(
        &caller,
        &chat_id,
        SendMessage {
            content: body.content,
            message_type: body.message_type,
            file_info: body.file_info,
            reply_to,
        },
    )?;
    Ok(HttpResponse::Created().json(MessageResponse { message }))
}

async fn edit_message(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<EditMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let (chat_id, message_id) = path.into_inner();
    let chat_id = parse_chat_id(&chat_id)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .service
        .edit_message(&caller, &chat_id, &message_id, &body.content)?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

async fn delete_message(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let (chat_id, message_id) = path.into_inner();
    let chat_id = parse_chat_id(&chat_id)?;
    let message_id = parse_message_id(&message_id)?;
    state.service.delete_message(&caller, &chat_id, &message_id)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn add_reaction(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<ReactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let (chat_id, message_id) = path.into_inner();
    let chat_id = parse_chat_id(&chat_id)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .service
        .add_reaction(&caller, &chat_id, &message_id, &body.emoji)?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

async fn remove_reaction(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let (chat_id, message_id, emoji) = path.into_inner();
    let chat_id = parse_chat_id(&chat_id)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .service
        .remove_reaction(&caller, &chat_id, &message_id, &emoji)?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

async fn unread_count(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &state.auth)?;
    let total = state.service.total_unread(&caller)?;
    Ok(HttpResponse::Ok().json(UnreadCountResponse {
        total_unread_count: total.total,
        chat_count: total.chat_count,
    }))
}
