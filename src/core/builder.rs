use std::sync::Arc;

use tracing::info;

use crate::{
    config::Config,
    error::ConfigError,
    events::Bus,
    jobs::AgentRef,
    notify::{Publisher, Transport},
    subscribers::{Subscribe, SubscriberSet},
};

use super::{
    dispatcher::Dispatcher,
    liveness::{BusyTracker, LivenessHost, LivenessSignal},
    registry::Registry,
    session::{LocalSessions, SessionManager, SessionProvider},
};

/// Builder for constructing a [`Dispatcher`] with optional host adapters.
///
/// The agent and the notification transport are required. The liveness host
/// defaults to an in-process [`BusyTracker`] and the session provider to
/// [`LocalSessions`] named after `cfg.session_name`.
pub struct DispatcherBuilder {
    cfg: Config,
    agent: AgentRef,
    transport: Arc<dyn Transport>,
    liveness: Option<Arc<dyn LivenessHost>>,
    sessions: Option<Arc<dyn SessionProvider>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DispatcherBuilder {
    /// Creates a new builder for `agent`, publishing outcomes through `transport`.
    pub fn new(cfg: Config, agent: AgentRef, transport: Arc<dyn Transport>) -> Self {
        Self {
            cfg,
            agent,
            transport,
            liveness: None,
            sessions: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the host liveness adapter.
    ///
    /// Keep a clone of a [`BusyTracker`] to answer the host's ping endpoint.
    pub fn with_liveness_host(mut self, host: Arc<dyn LivenessHost>) -> Self {
        self.liveness = Some(host);
        self
    }

    /// Sets the execution-context provider.
    pub fn with_session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(provider);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (job lifecycle, notification results,
    /// shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the dispatcher and starts the subscriber listener.
    ///
    /// Must be called from within a tokio runtime. Fails when no notification
    /// target is configured, since outcomes would have nowhere to go.
    pub fn build(self) -> Result<Arc<Dispatcher>, ConfigError> {
        if self.cfg.notification_target.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "NOTIFICATION_TARGET",
            });
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let registry = Registry::new(self.cfg.concurrency_limit());

        let publisher = Publisher::new(
            self.transport,
            self.cfg.notification_target.as_str(),
            self.cfg.max_result_chars,
            self.cfg.publish_timeout(),
            bus.clone(),
        );
        let host = self
            .liveness
            .unwrap_or_else(|| Arc::new(BusyTracker::new()) as Arc<dyn LivenessHost>);
        let provider = self
            .sessions
            .unwrap_or_else(|| {
                Arc::new(LocalSessions::new(self.cfg.session_name.as_str())) as Arc<dyn SessionProvider>
            });

        let liveness = LivenessSignal::new(host, bus.clone());
        let sessions = SessionManager::new(provider, publisher.clone(), bus.clone());

        info!(
            agent = self.agent.name(),
            model = %self.cfg.model_identifier,
            session = %self.cfg.session_name,
            topic = %self.cfg.notification_target,
            max_concurrent = self.cfg.max_concurrent,
            "dispatcher ready"
        );

        let dispatcher = Arc::new(Dispatcher::new_internal(
            self.cfg,
            bus,
            subs,
            registry,
            liveness,
            sessions,
            publisher,
            self.agent,
        ));
        dispatcher.subscriber_listener();
        Ok(dispatcher)
    }
}
