pub mod handlers;

use crate::{
    config::Config,
    error::GenerationError,
    models::ErrorBody,
    provider::TaskProvider,
};
use actix_web::{
    dev::Service,
    http::{
        header::{self, HeaderName, HeaderValue},
        StatusCode,
    },
    web, App, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppState {
    pub provider: Arc<dyn TaskProvider>,
    /// When set, generation routes require `Authorization: Bearer <secret>`.
    pub secret_key: Option<String>,
}

impl AppState {
    pub fn new(provider: Arc<dyn TaskProvider>) -> Self {
        Self {
            provider,
            secret_key: None,
        }
    }

    pub fn with_secret_key(mut self, secret_key: Option<String>) -> Self {
        self.secret_key = secret_key;
        self
    }

    fn authorize(&self, req: &HttpRequest) -> Result<(), GenerationError> {
        let Some(secret) = self.secret_key.as_deref() else {
            return Ok(());
        };
        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        if presented == Some(secret) {
            Ok(())
        } else {
            log::warn!("Rejected unauthenticated request to {}", req.path());
            Err(GenerationError::Unauthorized)
        }
    }
}

impl ResponseError for GenerationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ResponseError::status_code(self);
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::info!("Request rejected: {}", self);
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.message(),
        })
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/models", web::get().to(handlers::list_models))
        .route("/generations", web::post().to(handlers::create_generation))
        .route("/generations/", web::get().to(handlers::missing_task_id))
        .route("/generations/{task_id}", web::get().to(handlers::get_generation));
}

pub async fn run(config: Config, provider: Arc<dyn TaskProvider>) -> std::io::Result<()> {
    let port = config.port_or_default();
    let host = config.host.clone();
    let state = web::Data::new(AppState::new(provider).with_secret_key(config.secret_key));

    log::info!("Listening on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap_fn(|req, srv| {
                let request_id = Uuid::new_v4().to_string();
                let method = req.method().clone();
                let path = req.path().to_string();
                let started = Instant::now();
                let fut = srv.call(req);
                async move {
                    let mut res = fut.await?;
                    if let Ok(value) = HeaderValue::from_str(&request_id) {
                        res.headers_mut()
                            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
                    }
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    log::info!(
                        request_id = request_id.as_str(), duration_ms = elapsed_ms;
                        "{} {} -> {}",
                        method,
                        path,
                        res.status().as_u16()
                    );
                    Ok(res)
                }
            })
            .configure(routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Result,
        models::{GenerationRequest, ModelInput, TaskStatus},
    };
    use actix_web::{http::StatusCode, test};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct FakeProvider {
        created: Mutex<Vec<GenerationRequest>>,
        queried: Mutex<Vec<String>>,
        create_error: Option<GenerationError>,
        status: std::result::Result<TaskStatus, GenerationError>,
    }

    impl FakeProvider {
        fn ok(status: TaskStatus) -> Arc<Self> {
            Arc::new(Self {
                created: Mutex::new(Vec::new()),
                queried: Mutex::new(Vec::new()),
                create_error: None,
                status: Ok(status),
            })
        }

        fn failing(err: GenerationError) -> Arc<Self> {
            Arc::new(Self {
                created: Mutex::new(Vec::new()),
                queried: Mutex::new(Vec::new()),
                create_error: Some(err.clone()),
                status: Err(err),
            })
        }
    }

    #[async_trait]
    impl TaskProvider for FakeProvider {
        async fn create_task(&self, request: &GenerationRequest) -> Result<String> {
            if let Some(err) = &self.create_error {
                return Err(err.clone());
            }
            self.created.lock().unwrap().push(request.clone());
            Ok("task-42".to_string())
        }

        async fn query_task(&self, task_id: &str) -> Result<TaskStatus> {
            self.queried.lock().unwrap().push(task_id.to_string());
            self.status.clone()
        }
    }

    fn app_state(provider: Arc<FakeProvider>, secret: Option<&str>) -> web::Data<AppState> {
        web::Data::new(
            AppState::new(provider).with_secret_key(secret.map(|secret| secret.to_string())),
        )
    }

    #[actix_web::test]
    async fn test_create_generation_normalizes_and_submits() {
        let provider = FakeProvider::ok(TaskStatus::waiting("task-42"));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider.clone(), None))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/generations")
            .set_json(json!({
                "model": "sora-2-pro-text-to-video",
                "input": { "prompt": "a cat" }
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "taskId": "task-42" }));

        let created = provider.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        match created[0].input() {
            ModelInput::Sora(input) => {
                assert!(input.remove_watermark);
                assert_eq!(input.aspect_ratio, None);
            }
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_validation_errors_never_reach_provider() {
        let provider = FakeProvider::ok(TaskStatus::waiting("task-42"));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider.clone(), None))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/generations")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Invalid JSON body." }));

        let req = test::TestRequest::post()
            .uri("/generations")
            .set_json(json!({
                "model": "wan/2-2-a14b-text-to-video-turbo",
                "input": { "prompt": "x", "seed": 3.5 }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "seed must be an integer.");

        let req = test::TestRequest::post()
            .uri("/generations")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("null")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Unsupported model." }));

        assert!(provider.created.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_session_guard() {
        let provider = FakeProvider::ok(TaskStatus::waiting("task-42"));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider, Some("s3cret")))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/generations/task-42").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Unauthorized" }));

        let req = test::TestRequest::get()
            .uri("/generations/task-42")
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_status_shapes() {
        let provider = FakeProvider::ok(TaskStatus::success(
            "task-42",
            vec!["https://x/y.mp4".to_string()],
        ));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider, None))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/generations/task-42").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            json!({
                "taskId": "task-42",
                "state": "success",
                "resultUrls": ["https://x/y.mp4"],
                "failCode": null,
                "failMsg": null
            })
        );

        let req = test::TestRequest::get().uri("/generations/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Missing taskId." }));
    }

    #[actix_web::test]
    async fn test_task_id_is_passed_through_verbatim() {
        let provider = FakeProvider::ok(TaskStatus::waiting(" t-7 "));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider.clone(), None))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/generations/%20t-7%20")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(*provider.queried.lock().unwrap(), vec![" t-7 ".to_string()]);
        assert!(resp.headers().contains_key(header::CACHE_CONTROL));
    }

    #[actix_web::test]
    async fn test_provider_and_config_errors_keep_status() {
        let provider = FakeProvider::failing(GenerationError::protocol(
            "Kie createTask error: code=500 msg=busy",
        ));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider, None))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/generations")
            .set_json(json!({
                "model": "kling/v2-1-master-text-to-video",
                "input": { "prompt": "x" }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let provider = FakeProvider::failing(GenerationError::ConfigError(
            "Missing env: KIE_API_KEY".into(),
        ));
        let app = test::init_service(
            App::new()
                .app_data(app_state(provider, None))
                .configure(routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/generations/task-42").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Missing env: KIE_API_KEY" }));
    }

    #[actix_web::test]
    async fn test_models_catalog() {
        let app = test::init_service(App::new().configure(routes)).await;
        let req = test::TestRequest::get().uri("/models").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(|models| models.len()), Some(3));
        assert_eq!(body[1]["id"], "wan/2-2-a14b-text-to-video-turbo");
    }
}
