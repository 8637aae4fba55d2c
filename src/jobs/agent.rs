//! # Agent capability and function-backed implementation.
//!
//! The agent is the opaque long-running computation a job exists to run. The
//! runtime never looks inside it: it hands over the input, waits, and turns
//! whatever comes back into an [`Outcome`](crate::Outcome).
//!
//! - [`Agent`] trait: `execute(input, ctx) -> Result<String, AgentError>`
//! - [`AgentFn`] closure-backed implementation, producing a fresh future per call
//! - [`AgentRef`] shared handle (`Arc<dyn Agent>`)
//!
//! An agent receives a [`CancellationToken`]. It is cancelled when the host stops
//! the job through `Dispatcher::cancel` or the dispatcher shuts down;
//! long-running agents should check it between steps.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// Shared reference to an agent.
pub type AgentRef = Arc<dyn Agent>;

/// # Opaque long-running computation.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use jobvisor::{Agent, AgentError};
///
/// struct Reporter;
///
/// #[async_trait]
/// impl Agent for Reporter {
///     fn name(&self) -> &str { "reporter" }
///
///     async fn execute(&self, input: &str, ctx: CancellationToken) -> Result<String, AgentError> {
///         if ctx.is_cancelled() {
///             return Err(AgentError::new("cancelled"));
///         }
///         Ok(format!("report for: {input}"))
///     }
/// }
/// ```
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Returns a stable, human-readable agent name.
    fn name(&self) -> &str {
        "agent"
    }

    /// Runs the agent to completion on `input`.
    ///
    /// Called exactly once per job; the runtime never retries.
    async fn execute(&self, input: &str, ctx: CancellationToken) -> Result<String, AgentError>;
}

/// Function-backed agent.
///
/// Wraps a closure that *creates* a new future per call; shared state has to be
/// captured explicitly (e.g. `Arc<...>`).
pub struct AgentFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> AgentFn<F> {
    /// Creates a new function-backed agent.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the agent and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use jobvisor::{AgentFn, AgentRef, AgentError};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let agent: AgentRef = AgentFn::arc("echo", |input: String, _ctx: CancellationToken| async move {
    ///     Ok::<_, AgentError>(input)
    /// });
    /// assert_eq!(agent.name(), "echo");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Agent for AgentFn<F>
where
    F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, AgentError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: &str, ctx: CancellationToken) -> Result<String, AgentError> {
        (self.f)(input.to_string(), ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_agent_receives_input() {
        let agent: AgentRef = AgentFn::arc("upper", |input: String, _ctx: CancellationToken| async move {
            Ok::<_, AgentError>(input.to_uppercase())
        });
        let out = agent
            .execute("report", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "REPORT");
        assert_eq!(agent.name(), "upper");
    }

    #[tokio::test]
    async fn closure_agent_propagates_error() {
        let agent = AgentFn::new("broken", |_input: String, _ctx: CancellationToken| async move {
            Err::<String, _>(AgentError::new("quota exceeded"))
        });
        let err = agent.execute("x", CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.message(), "quota exceeded");
    }
}
