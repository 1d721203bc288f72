pub mod status_client;
pub mod task_client;

use crate::{
    config::KieConfig,
    error::Result,
    models::{GenerationRequest, TaskStatus},
    provider::TaskProvider,
};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

pub use status_client::StatusClient;
pub use task_client::TaskClient;

/// Shared HTTP plumbing for the Kie.ai job endpoints.
#[derive(Clone)]
pub struct KieHttp {
    client: Client,
    config: Arc<KieConfig>,
}

impl KieHttp {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Best-effort status and body text; an unreadable body becomes "".
async fn read_response(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    (status, text)
}

#[derive(Clone)]
pub struct KieClient {
    task_client: TaskClient,
    status_client: StatusClient,
}

impl KieClient {
    pub fn new(config: KieConfig) -> Self {
        Self::with_http_client(config, Client::new())
    }

    pub fn with_http_client(config: KieConfig, client: Client) -> Self {
        if config.api_key.is_none() {
            log::warn!("KIE_API_KEY is not set; provider calls will fail until it is");
        }
        let http = KieHttp {
            client,
            config: Arc::new(config),
        };

        Self {
            task_client: TaskClient::new(http.clone()),
            status_client: StatusClient::new(http),
        }
    }

    pub fn tasks(&self) -> &TaskClient {
        &self.task_client
    }

    pub fn status(&self) -> &StatusClient {
        &self.status_client
    }
}

#[async_trait]
impl TaskProvider for KieClient {
    async fn create_task(&self, request: &GenerationRequest) -> Result<String> {
        self.task_client.create_task(request).await
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskStatus> {
        self.status_client.query_task(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        // Unroutable base URL: reaching the network would surface a RequestError.
        let client = KieClient::new(KieConfig::new().with_base_url("http://127.0.0.1:9"));
        let request = crate::validation::normalize(
            "wan/2-2-a14b-text-to-video-turbo",
            &serde_json::json!({ "prompt": "waves" }),
        )
        .unwrap();

        let err = client.create_task(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::ConfigError(_)));

        let err = client.query_task("t1").await.unwrap_err();
        assert!(matches!(err, GenerationError::ConfigError(_)));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let http = KieHttp {
            client: Client::new(),
            config: Arc::new(KieConfig::new().with_base_url("https://api.kie.ai/")),
        };
        assert_eq!(
            http.endpoint("/api/v1/jobs/createTask"),
            "https://api.kie.ai/api/v1/jobs/createTask"
        );
    }
}
