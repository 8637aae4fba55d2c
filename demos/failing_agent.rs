//! # Demo: failing_agent
//!
//! Every way a job can end badly still produces exactly one `Error`
//! notification, and none of them take the process down.
//!
//! Shows how to:
//! - Observe agent errors, empty results and hard timeouts as `Error` outcomes.
//! - Cancel a running job through graceful shutdown.
//! - Read the failure detail from the published envelope.
//!
//! ## Flow
//! ```text
//! "quota"   ─► agent Err           ─► Error: "agent failed: model quota exceeded"
//! "empty"   ─► agent Ok("")        ─► Error: "agent returned an empty result"
//! "slow"    ─► JOB_TIMEOUT (1s)    ─► Error: "job timed out after 1s"
//! "endless" ─► shutdown() cancels  ─► Error: "job cancelled before completion"
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example failing_agent
//! ```

use std::{sync::Arc, time::Duration};

use jobvisor::{
    AgentError, AgentFn, AgentRef, Config, DispatcherBuilder, JobRequest, MemoryTransport,
    NotificationEnvelope,
};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    jobvisor::telemetry::init();

    let mut cfg = Config::new("arn:demo:agent-jobs");
    cfg.job_timeout = Duration::from_secs(1);
    cfg.grace = Duration::from_secs(5);

    // The input selects the failure mode.
    let agent: AgentRef = AgentFn::arc("flaky", |input: String, ctx: CancellationToken| async move {
        match input.as_str() {
            "quota" => Err(AgentError::new("model quota exceeded")),
            "empty" => Ok(String::new()),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok("too late".to_string())
            }
            _ => {
                ctx.cancelled().await;
                Err(AgentError::new("stopped"))
            }
        }
    });

    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = DispatcherBuilder::new(cfg, agent, transport.clone()).build()?;

    for mode in ["quota", "empty", "slow"] {
        dispatcher.accept(JobRequest::start(mode, mode)).await?;
    }
    dispatcher.wait_idle().await;

    dispatcher.accept(JobRequest::start("endless", "endless")).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    dispatcher.shutdown().await?;

    for msg in transport.sent() {
        let env: NotificationEnvelope = serde_json::from_str(&msg.body)?;
        println!("[topic] {} -> {}", msg.subject, env.message);
    }
    Ok(())
}
