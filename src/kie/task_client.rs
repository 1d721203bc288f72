use super::{read_response, KieHttp};
use crate::{
    error::{GenerationError, Result},
    models::{CreateTaskData, GenerationRequest, KieEnvelope, ModelInput, VideoModel},
};
use serde::Serialize;

#[derive(Serialize)]
struct CreateTaskBody<'a> {
    model: VideoModel,
    input: &'a ModelInput,
    #[serde(rename = "callBackUrl", skip_serializing_if = "Option::is_none")]
    call_back_url: Option<&'a str>,
}

#[derive(Clone)]
pub struct TaskClient {
    http: KieHttp,
}

impl TaskClient {
    pub fn new(http: KieHttp) -> Self {
        Self { http }
    }

    pub async fn create_task(&self, request: &GenerationRequest) -> Result<String> {
        let api_key = self.http.config.require_api_key()?;

        let body = CreateTaskBody {
            model: request.model(),
            input: request.input(),
            call_back_url: self.http.config.callback_url.as_deref(),
        };

        log::info!("Creating task with model: {}", request.model());
        log::debug!(
            "createTask payload: {}",
            serde_json::to_string(&body).unwrap_or_default()
        );

        let response = self
            .http
            .client
            .post(self.http.endpoint("/api/v1/jobs/createTask"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::error!("createTask transport error: {:?}", e);
                GenerationError::RequestError(format!("Kie createTask request failed: {}", e))
            })?;

        let (status, text) = read_response(response).await;
        let task_id = parse_create_response(status, &text)?;
        log::info!(task_id = task_id.as_str(), model = request.model().as_str(); "Task created");
        Ok(task_id)
    }
}

/// Interpret a `createTask` reply. Split out so it can be tested without a
/// network.
pub(crate) fn parse_create_response(status: u16, text: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        return Err(GenerationError::provider(
            status,
            format!("Kie createTask failed: HTTP {} {}", status, text)
                .trim_end()
                .to_string(),
        ));
    }

    let envelope: KieEnvelope<CreateTaskData> = serde_json::from_str(text).map_err(|e| {
        log::warn!("createTask returned an undecodable body: {}", e);
        GenerationError::protocol("Kie createTask error: response body is not valid JSON")
    })?;

    match envelope.data.as_ref().and_then(|data| data.task_id.as_deref()) {
        Some(task_id) if envelope.is_ok() && !task_id.is_empty() => Ok(task_id.to_string()),
        _ => Err(GenerationError::protocol(format!(
            "Kie createTask error: {}",
            envelope.describe()
        ))),
    }
}
