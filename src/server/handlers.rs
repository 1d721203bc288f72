use super::AppState;
use crate::{
    error::GenerationError,
    models::{supported_models, TaskCreated},
    validation,
};
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::{json, Value};

pub async fn create_generation(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, GenerationError> {
    state.authorize(&req)?;

    let body: Value = serde_json::from_slice(&body)
        .map_err(|_| GenerationError::validation("Invalid JSON body."))?;
    let request = validation::normalize_body(&body)?;
    let task_id = state.provider.create_task(&request).await?;

    Ok(HttpResponse::Ok().json(TaskCreated { task_id }))
}

pub async fn get_generation(
    req: HttpRequest,
    state: web::Data<AppState>,
    task_id: web::Path<String>,
) -> Result<HttpResponse, GenerationError> {
    state.authorize(&req)?;

    let task_id = task_id.into_inner();
    if task_id.is_empty() {
        return Err(GenerationError::validation("Missing taskId."));
    }

    let status = state.provider.query_task(&task_id).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(status))
}

pub async fn missing_task_id(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GenerationError> {
    state.authorize(&req)?;
    Err(GenerationError::validation("Missing taskId."))
}

pub async fn list_models() -> HttpResponse {
    HttpResponse::Ok().json(supported_models())
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
