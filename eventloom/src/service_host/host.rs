use super::backoff::Backoff;
use super::service::Service;
use crate::config::HostConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Outcome of a supervised run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Iterations started, successful or not.
    pub iterations: u64,
    /// Iterations in which some service failed.
    pub failed_iterations: u64,
}

/// Outcome of one service under [`ServiceHost::run_isolated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    /// The service's name.
    pub name: String,
    /// Counters for the service's own loop.
    pub summary: RunSummary,
}

/// Runs registered services in a loop, backing off after failures.
///
/// In the cooperative mode ([`run`](Self::run)) every iteration calls each service
/// once, in registration order. The first failure ends the iteration: the remaining
/// services are skipped, the error is logged and the host sleeps for the next
/// backoff delay. A fully successful iteration resets the backoff.
pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
    config: HostConfig,
    backoff: Backoff,
}

impl ServiceHost {
    /// Creates an empty host.
    pub const fn new(config: HostConfig) -> Self {
        Self {
            services: Vec::new(),
            backoff: Backoff::new(config.backoff),
            config,
        }
    }

    /// Adds a service; services run in the order they were registered.
    pub fn register(&mut self, service: impl Service + 'static) -> &mut Self {
        self.services.push(Box::new(service));
        self
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service has been registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Names of the registered services, in run order.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|service| service.name()).collect()
    }

    /// The host's backoff state.
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Runs until `max_iterations` have completed, or forever when `None`.
    pub async fn run(&mut self, max_iterations: Option<u64>) -> RunSummary {
        self.run_until(max_iterations, std::future::pending::<()>())
            .await
    }

    /// Like [`run`](Self::run), but also stops as soon as `shutdown` resolves.
    ///
    /// Shutdown is observed while sleeping, never in the middle of a service's
    /// `run_once`.
    #[instrument(skip(self, shutdown), fields(services = self.services.len()))]
    pub async fn run_until<F>(&mut self, max_iterations: Option<u64>, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()> + Send,
    {
        let mut summary = RunSummary::default();
        let poll_interval = self.config.poll_interval.as_duration();
        tokio::pin!(shutdown);

        info!(services = ?self.service_names(), "service host started");

        loop {
            summary.iterations += 1;

            if let Some(delay) = self.iterate().await {
                summary.failed_iterations += 1;
                if !sleep_or_shutdown(delay, &mut shutdown).await {
                    break;
                }
            }

            if max_iterations.is_some_and(|max| summary.iterations >= max) {
                break;
            }

            if !sleep_or_shutdown(poll_interval, &mut shutdown).await {
                break;
            }
        }

        info!(
            iterations = summary.iterations,
            failed_iterations = summary.failed_iterations,
            "service host stopped"
        );
        summary
    }

    /// Runs each service in its own task with its own backoff.
    ///
    /// A failing service does not delay the others. Each task stops after
    /// `max_iterations` of its own loop, or never when `None`.
    pub async fn run_isolated(self, max_iterations: Option<u64>) -> Vec<ServiceSummary> {
        let handles: Vec<_> = self
            .services
            .into_iter()
            .map(|service| {
                let name = service.name().to_string();
                let config = self.config;
                let handle =
                    tokio::spawn(async move { run_alone(service, config, max_iterations).await });
                (name, handle)
            })
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(summary) => summaries.push(ServiceSummary { name, summary }),
                Err(e) => error!(service = %name, error = %e, "service task terminated"),
            }
        }
        summaries
    }

    /// One pass over the services. Returns the backoff delay if one failed.
    async fn iterate(&mut self) -> Option<Duration> {
        for service in &mut self.services {
            if let Err(e) = service.run_once().await {
                let delay = self.backoff.next_delay();
                error!(
                    service = %service.name(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "service failed, backing off"
                );
                return Some(delay);
            }
        }

        if self.backoff.current().is_some() {
            debug!("services recovered, resetting backoff");
        }
        self.backoff.reset();
        None
    }
}

impl std::fmt::Debug for ServiceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHost")
            .field("services", &self.service_names())
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish()
    }
}

async fn run_alone(
    mut service: Box<dyn Service>,
    config: HostConfig,
    max_iterations: Option<u64>,
) -> RunSummary {
    let mut backoff = Backoff::new(config.backoff);
    let mut summary = RunSummary::default();

    loop {
        summary.iterations += 1;

        match service.run_once().await {
            Ok(()) => backoff.reset(),
            Err(e) => {
                summary.failed_iterations += 1;
                let delay = backoff.next_delay();
                error!(
                    service = %service.name(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "service failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        if max_iterations.is_some_and(|max| summary.iterations >= max) {
            return summary;
        }
        tokio::time::sleep(config.poll_interval.as_duration()).await;
    }
}

/// Sleeps for `delay`. Returns false if `shutdown` resolved first.
async fn sleep_or_shutdown<F>(delay: Duration, shutdown: &mut std::pin::Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = shutdown.as_mut() => {
            info!("shutdown requested");
            false
        }
        () = tokio::time::sleep(delay) => true,
    }
}
