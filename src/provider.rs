use crate::{
    error::Result,
    models::{GenerationRequest, TaskStatus},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can start a render task and report on it.
///
/// Each call is exactly one remote round trip; implementations never loop or
/// retry. Polling belongs to [`crate::poll::PollController`].
#[async_trait]
pub trait TaskProvider: Send + Sync {
    async fn create_task(&self, request: &GenerationRequest) -> Result<String>;

    async fn query_task(&self, task_id: &str) -> Result<TaskStatus>;
}

#[async_trait]
impl<P: TaskProvider + ?Sized> TaskProvider for Arc<P> {
    async fn create_task(&self, request: &GenerationRequest) -> Result<String> {
        (**self).create_task(request).await
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskStatus> {
        (**self).query_task(task_id).await
    }
}
