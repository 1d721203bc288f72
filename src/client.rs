use crate::{
    error::{GenerationError, Result},
    models::{ErrorBody, GenerationRequest, TaskCreated, TaskStatus},
    provider::TaskProvider,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Client for this crate's own `/generations` HTTP surface.
#[derive(Clone)]
pub struct GenerationsClient {
    client: Client,
    base_url: String,
    session_token: Option<String>,
}

impl GenerationsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    fn task_url(&self, task_id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}/generations", self.base_url))
            .map_err(|e| GenerationError::ConfigError(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GenerationError::ConfigError("Invalid base URL".to_string()))?
            .push(task_id);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.session_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| GenerationError::RequestError(format!("Request failed: {}", e)))?;
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        decode_reply(status, &text)
    }
}

fn decode_reply<T: DeserializeOwned>(status: u16, text: &str) -> Result<T> {
    if (200..300).contains(&status) {
        return serde_json::from_str(text)
            .map_err(|e| GenerationError::ResponseError(format!("Unexpected reply: {}", e)));
    }

    let message = serde_json::from_str::<ErrorBody>(text)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("HTTP {}", status));
    Err(match status {
        400 => GenerationError::ValidationError(message),
        401 => GenerationError::Unauthorized,
        409 => GenerationError::InvalidState(message),
        _ => GenerationError::provider(status, message),
    })
}

#[async_trait]
impl TaskProvider for GenerationsClient {
    async fn create_task(&self, request: &GenerationRequest) -> Result<String> {
        let builder = self
            .client
            .post(format!("{}/generations", self.base_url))
            .json(request);
        let created: TaskCreated = self.send(builder).await?;
        Ok(created.task_id)
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskStatus> {
        let builder = self
            .client
            .get(self.task_url(task_id)?)
            .header(reqwest::header::CACHE_CONTROL, "no-store");
        self.send(builder).await
    }
}
