use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    Success,
    Fail,
}

impl TaskState {
    /// Anything the provider reports besides `success`/`fail` (queueing,
    /// generating, ...) is still in progress from our point of view.
    pub fn from_provider(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "success" => TaskState::Success,
            "fail" => TaskState::Fail,
            _ => TaskState::Waiting,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Waiting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Waiting => "waiting",
            TaskState::Success => "success",
            TaskState::Fail => "fail",
        }
    }
}

/// Normalized view of one provider task, as served by `GET /generations/{taskId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub result_urls: Vec<String>,
    #[serde(default)]
    pub fail_code: Option<String>,
    #[serde(default)]
    pub fail_msg: Option<String>,
    /// Set when the task succeeded but its result payload could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl TaskStatus {
    pub fn waiting(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::Waiting,
            result_urls: Vec::new(),
            fail_code: None,
            fail_msg: None,
            warning: None,
        }
    }

    pub fn success(task_id: impl Into<String>, result_urls: Vec<String>) -> Self {
        Self {
            state: TaskState::Success,
            result_urls,
            ..Self::waiting(task_id)
        }
    }

    pub fn fail(
        task_id: impl Into<String>,
        fail_code: Option<String>,
        fail_msg: Option<String>,
    ) -> Self {
        Self {
            state: TaskState::Fail,
            fail_code,
            fail_msg,
            ..Self::waiting(task_id)
        }
    }
}

/// Body returned by `POST /generations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
}

/// `{ error }` body used for every failed inbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Envelope wrapping every Kie.ai job response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct KieEnvelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> KieEnvelope<T> {
    pub fn is_ok(&self) -> bool {
        self.code == Some(200)
    }

    pub fn describe(&self) -> String {
        format!(
            "code={} msg={}",
            self.code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.msg.as_deref().unwrap_or("none")
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskData {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Only the fields we act on are typed; the rest are kept as raw JSON so an
/// unexpected shape there cannot fail the whole envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfoData {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub param: Option<Value>,
    #[serde(default)]
    pub result_json: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fail_code: Option<String>,
    #[serde(default)]
    pub fail_msg: Option<String>,
    #[serde(default)]
    pub cost_time: Option<Value>,
    #[serde(default)]
    pub complete_time: Option<Value>,
    #[serde(default)]
    pub create_time: Option<Value>,
}

/// Decoded form of `RecordInfoData::result_json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    #[serde(default)]
    pub result_urls: Vec<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_states() {
        assert_eq!(TaskState::from_provider("success"), TaskState::Success);
        assert_eq!(TaskState::from_provider("fail"), TaskState::Fail);
        assert_eq!(TaskState::from_provider("waiting"), TaskState::Waiting);
        assert_eq!(TaskState::from_provider("generating"), TaskState::Waiting);
        assert!(!TaskState::Waiting.is_terminal());
        assert!(TaskState::Fail.is_terminal());
    }

    #[test]
    fn test_status_wire_shape() {
        let status = TaskStatus::waiting("t-1");
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "taskId": "t-1",
                "state": "waiting",
                "resultUrls": [],
                "failCode": null,
                "failMsg": null
            })
        );
    }

    #[test]
    fn test_record_info_accepts_numeric_fail_code() {
        let data: RecordInfoData = serde_json::from_value(json!({
            "taskId": "t-2",
            "state": "fail",
            "failCode": 422,
            "failMsg": "content policy"
        }))
        .unwrap();
        assert_eq!(data.fail_code.as_deref(), Some("422"));
        assert_eq!(data.result_json, None);
    }

    #[test]
    fn test_envelope_decodes_without_data() {
        let envelope: KieEnvelope<CreateTaskData> =
            serde_json::from_str(r#"{"code":401,"msg":"bad key"}"#).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.describe(), "code=401 msg=bad key");

        let envelope: KieEnvelope<RecordInfoData> = serde_json::from_str(
            r#"{"code":200,"msg":"success","data":{"taskId":"t-3","state":"waiting"}}"#,
        )
        .unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.data.unwrap().state.as_deref(), Some("waiting"));
    }

    #[test]
    fn test_record_info_tolerates_loose_metadata() {
        let data: RecordInfoData = serde_json::from_value(json!({
            "taskId": "t-4",
            "model": "sora-2-pro-text-to-video",
            "state": "success",
            "param": { "prompt": "a cat" },
            "costTime": 12.5,
            "completeTime": 1_700_000_000_123i64,
            "createTime": null
        }))
        .unwrap();
        assert_eq!(data.state.as_deref(), Some("success"));
        assert_eq!(data.cost_time, Some(json!(12.5)));
    }
}
