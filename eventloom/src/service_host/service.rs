use async_trait::async_trait;

/// Error type services report to the host.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// A polling service driven by the [`ServiceHost`](super::ServiceHost).
///
/// `run_once` should do one bounded unit of work and return. Services are expected
/// to be idempotent pollers: after a failure the host calls `run_once` again, after
/// a backoff, and the service resumes from its own durable state.
#[async_trait]
pub trait Service: Send {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Performs one polling step.
    async fn run_once(&mut self) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: Service + ?Sized> Service for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run_once(&mut self) -> Result<(), ServiceError> {
        (**self).run_once().await
    }
}
