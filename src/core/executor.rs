//! # Run the agent once for a job and turn the result into an [`Outcome`].
//!
//! - **Invoke the agent exactly once** with the job's input and a child cancellation token
//! - **Apply the optional delay and hard timeout**
//! - **Classify** the result into `Success` / `Error` and publish lifecycle events
//!
//! ## Flow
//!
//! ```text
//! [delay?] ─► JobStarting ─► agent.execute(input, child)
//!                                 │
//!   Ok(non-blank)                 ├─► Success { result }           ─► JobSucceeded
//!   Ok(blank)                     ├─► Error(EmptyResult)            ─► JobFailed
//!   Err(e)                        ├─► Error(Agent(e))               ─► JobFailed
//!   panic                         ├─► Error(Panicked)               ─► JobFailed
//!   job token cancelled           ├─► Error(Canceled), child cancel ─► JobFailed
//!   timeout elapsed               └─► Error(Timeout), child cancel  ─► JobFailed
//! ```
//!
//! ## Rules
//! - Always returns **exactly one** outcome and publishes **exactly one** of
//!   `JobSucceeded` / `JobFailed`.
//! - Cancellation is a failure here: the caller asked for a result and did not get one.
//! - The agent's token is a child of the job token; cancelling it never affects
//!   the job token or its siblings.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tracing::{error, info};

use crate::error::ExecutionError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{Agent, JobHandle, Outcome, truncate_chars};
use crate::subscribers::panic_message;

/// Characters of input/result shown in log markers.
const LOG_PREVIEW_CHARS: usize = 200;

/// Runs `agent` once for `handle`, publishing lifecycle events to `bus`.
///
/// ### Timeout behavior
/// If `timeout` is `Some(dur)` and `dur > 0` the agent call is wrapped in
/// `tokio::time::timeout`; on expiry the child token is cancelled and the job
/// fails with [`ExecutionError::Timeout`].
pub async fn run(
    handle: &JobHandle,
    agent: &dyn Agent,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Outcome {
    let res = execute(handle, agent, timeout, bus).await;
    finish(handle, res, bus)
}

async fn execute(
    handle: &JobHandle,
    agent: &dyn Agent,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Result<String, ExecutionError> {
    let job_token = handle.cancel_token();

    if let Some(delay) = handle.delay() {
        tokio::select! {
            biased;
            _ = job_token.cancelled() => return Err(ExecutionError::Canceled),
            _ = time::sleep(delay) => {}
        }
    }

    info!(
        job_id = handle.job_id(),
        task_id = handle.task_id(),
        agent = agent.name(),
        input = %truncate_chars(handle.input(), LOG_PREVIEW_CHARS, "..."),
        "agent job started"
    );
    bus.publish(
        Event::new(EventKind::JobStarting)
            .with_job(handle.job_id_arc())
            .with_task_id(handle.task_id()),
    );

    let child = job_token.child_token();
    let call = AssertUnwindSafe(agent.execute(handle.input(), child.clone())).catch_unwind();
    let timed = async {
        match timeout.filter(|d| *d > Duration::ZERO) {
            Some(dur) => time::timeout(dur, call)
                .await
                .map_err(|_elapsed| ExecutionError::Timeout { timeout: dur }),
            None => Ok(call.await),
        }
    };

    let res = tokio::select! {
        biased;
        _ = job_token.cancelled() => Err(ExecutionError::Canceled),
        r = timed => match r {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(ExecutionError::Agent(e)),
            Ok(Err(payload)) => Err(ExecutionError::Panicked {
                info: panic_message(payload.as_ref()),
            }),
            Err(e) => Err(e),
        },
    };
    if res.is_err() {
        child.cancel();
    }

    match res {
        Ok(value) if value.trim().is_empty() => Err(ExecutionError::EmptyResult),
        other => other,
    }
}

fn finish(handle: &JobHandle, res: Result<String, ExecutionError>, bus: &Bus) -> Outcome {
    let elapsed_ms = handle.elapsed().as_millis() as u64;
    match res {
        Ok(value) => {
            info!(
                job_id = handle.job_id(),
                task_id = handle.task_id(),
                elapsed_ms,
                result = %truncate_chars(&value, LOG_PREVIEW_CHARS, "..."),
                "agent job completed"
            );
            bus.publish(
                Event::new(EventKind::JobSucceeded)
                    .with_job(handle.job_id_arc())
                    .with_task_id(handle.task_id()),
            );
            Outcome::success(handle.job_id(), value)
        }
        Err(e) => {
            let detail = e.to_string();
            error!(
                job_id = handle.job_id(),
                task_id = handle.task_id(),
                elapsed_ms,
                label = e.as_label(),
                error = %truncate_chars(&detail, LOG_PREVIEW_CHARS, "..."),
                "agent job failed"
            );
            bus.publish(
                Event::new(EventKind::JobFailed)
                    .with_job(handle.job_id_arc())
                    .with_task_id(handle.task_id())
                    .with_reason(detail.as_str()),
            );
            Outcome::error(handle.job_id(), detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::jobs::AgentFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn handle(input: &str) -> JobHandle {
        JobHandle::new("job", input, None, CancellationToken::new())
    }

    #[tokio::test]
    async fn success_carries_agent_value() {
        let agent = AgentFn::new("echo", |input: String, _ctx: CancellationToken| async move {
            Ok::<_, AgentError>(format!("echo: {input}"))
        });
        let out = run(&handle("hi"), &agent, None, &Bus::new(8)).await;
        assert_eq!(out.result(), Some("echo: hi"));
    }

    #[tokio::test]
    async fn agent_invoked_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let agent = AgentFn::new("count", move |_input: String, _ctx: CancellationToken| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(AgentError::new("no"))
            }
        });
        let out = run(&handle("x"), &agent, None, &Bus::new(8)).await;
        assert!(!out.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_result_is_an_error() {
        let agent = AgentFn::new("blank", |_input: String, _ctx: CancellationToken| async {
            Ok::<_, AgentError>("  \n".to_string())
        });
        let out = run(&handle("x"), &agent, None, &Bus::new(8)).await;
        assert_eq!(out.error_message(), Some("agent returned an empty result"));
    }

    #[tokio::test]
    async fn agent_error_detail_is_kept() {
        let agent = AgentFn::new("quota", |_input: String, _ctx: CancellationToken| async {
            Err::<String, _>(AgentError::new("model quota exceeded"))
        });
        let out = run(&handle("x"), &agent, None, &Bus::new(8)).await;
        assert!(out.error_message().unwrap().contains("model quota exceeded"));
    }

    #[tokio::test]
    async fn panic_becomes_error_outcome() {
        let agent = AgentFn::new("panics", |_input: String, _ctx: CancellationToken| async {
            if true {
                panic!("tool crashed");
            }
            Ok::<String, AgentError>(String::new())
        });
        let out = run(&handle("x"), &agent, None, &Bus::new(8)).await;
        assert!(out.error_message().unwrap().contains("tool crashed"));
    }

    #[tokio::test(start_paused = true)]
    async fn hard_timeout_cancels_agent() {
        let agent = AgentFn::new("slow", |_input: String, ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok::<_, AgentError>("late".to_string())
        });
        let out = run(&handle("x"), &agent, Some(Duration::from_secs(5)), &Bus::new(8)).await;
        assert!(out.error_message().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_job_fails_even_if_agent_ignores_token() {
        let token = CancellationToken::new();
        let h = JobHandle::new("job", "x", None, token.clone());
        let agent = AgentFn::new("deaf", |_input: String, _ctx: CancellationToken| async {
            std::future::pending::<Result<String, AgentError>>().await
        });
        token.cancel();
        let out = run(&h, &agent, None, &Bus::new(8)).await;
        assert_eq!(out.error_message(), Some("job cancelled before completion"));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_runs_before_agent() {
        let h = JobHandle::new(
            "job",
            "x",
            Some(Duration::from_secs(30)),
            CancellationToken::new(),
        );
        let agent = AgentFn::new("ok", |_input: String, _ctx: CancellationToken| async {
            Ok::<_, AgentError>("done".to_string())
        });
        let start = time::Instant::now();
        let out = run(&h, &agent, None, &Bus::new(8)).await;
        assert!(out.is_success());
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn publishes_one_terminal_event() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let agent = AgentFn::new("ok", |_input: String, _ctx: CancellationToken| async {
            Ok::<_, AgentError>("r".to_string())
        });
        run(&handle("x"), &agent, None, &bus).await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::JobStarting);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::JobSucceeded);
        assert!(rx.try_recv().is_err());
    }
}
