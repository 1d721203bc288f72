use super::{read_response, KieHttp};
use crate::{
    error::{GenerationError, Result},
    models::{KieEnvelope, RecordInfoData, ResultPayload, TaskState, TaskStatus},
};

#[derive(Clone)]
pub struct StatusClient {
    http: KieHttp,
}

impl StatusClient {
    pub fn new(http: KieHttp) -> Self {
        Self { http }
    }

    /// One `recordInfo` lookup. Does not retry.
    pub async fn query_task(&self, task_id: &str) -> Result<TaskStatus> {
        let api_key = self.http.config.require_api_key()?;

        log::debug!(task_id = task_id; "Querying task");

        let response = self
            .http
            .client
            .get(self.http.endpoint("/api/v1/jobs/recordInfo"))
            .query(&[("taskId", task_id)])
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| {
                log::error!("recordInfo transport error: {:?}", e);
                GenerationError::RequestError(format!("Kie recordInfo request failed: {}", e))
            })?;

        let (status, text) = read_response(response).await;
        parse_record_response(task_id, status, &text)
    }
}

pub(crate) fn parse_record_response(task_id: &str, status: u16, text: &str) -> Result<TaskStatus> {
    if !(200..300).contains(&status) {
        return Err(GenerationError::provider(
            status,
            format!("Kie recordInfo failed: HTTP {} {}", status, text)
                .trim_end()
                .to_string(),
        ));
    }

    let envelope: KieEnvelope<RecordInfoData> = serde_json::from_str(text).map_err(|e| {
        log::warn!("recordInfo returned an undecodable body: {}", e);
        GenerationError::protocol("Kie recordInfo error: response body is not valid JSON")
    })?;

    let data = match (envelope.is_ok(), envelope.data.as_ref()) {
        (true, Some(data)) => data,
        _ => {
            return Err(GenerationError::protocol(format!(
                "Kie recordInfo error: {}",
                envelope.describe()
            )))
        }
    };

    let state = TaskState::from_provider(data.state.as_deref().unwrap_or_default());
    log::debug!(
        task_id = task_id;
        "Task is {} (provider state {:?})",
        state.as_str(),
        data.state
    );

    Ok(match state {
        TaskState::Success => decode_success(task_id, data.result_json.as_deref()),
        TaskState::Fail => {
            TaskStatus::fail(task_id, data.fail_code.clone(), data.fail_msg.clone())
        }
        TaskState::Waiting => TaskStatus::waiting(task_id),
    })
}

/// The job itself finished, so an unreadable `resultJson` degrades to an
/// empty result list with a warning instead of an error.
fn decode_success(task_id: &str, result_json: Option<&str>) -> TaskStatus {
    let raw = result_json.unwrap_or_default();
    match serde_json::from_str::<ResultPayload>(raw) {
        Ok(payload) => TaskStatus::success(task_id, payload.result_urls),
        Err(e) => {
            log::warn!(
                task_id = task_id;
                "Task succeeded but resultJson could not be decoded: {}",
                e
            );
            TaskStatus {
                warning: Some("Result payload could not be decoded.".to_string()),
                ..TaskStatus::success(task_id, Vec::new())
            }
        }
    }
}
