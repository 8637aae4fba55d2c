//! # Demo: daily_report
//!
//! The scheduled-report scenario end to end: a scheduler posts a start request,
//! gets an acknowledgment right away, and the report arrives later as one
//! notification on the topic.
//!
//! Shows how to:
//! - Build a [`Dispatcher`] with a closure agent and an in-memory transport.
//! - Answer the host's ping from a shared [`BusyTracker`].
//! - Attach a [`Subscribe`] implementation to watch the job lifecycle.
//!
//! ## Flow
//! ```text
//! accept_json(request) ──► Ack { started }              (immediately)
//!     └─► background job
//!           ├─► LivenessRaised / SessionAcquired / JobStarting
//!           ├─► agent runs (ping: HealthyBusy)
//!           ├─► JobSucceeded ─► NotificationSent
//!           └─► SessionReleased ─► LivenessLowered      (ping: Healthy)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example daily_report
//! ```

use std::{sync::Arc, time::Duration};

use jobvisor::{
    AgentError, AgentFn, AgentRef, BusyTracker, Config, DispatcherBuilder, Event, EventKind,
    MemoryTransport, Subscribe,
};
use tokio_util::sync::CancellationToken;

/// Prints lifecycle events as they happen.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let job = ev.job_id.as_deref().unwrap_or("-");
        match ev.kind {
            EventKind::JobFailed | EventKind::NotificationFailed => println!(
                "[sub] {:?} job={job} reason={}",
                ev.kind,
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            kind => println!("[sub] {kind:?} job={job}"),
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    jobvisor::telemetry::init();

    // 1. Configuration from the environment, with a demo topic as fallback
    let cfg = Config::from_env().unwrap_or_else(|_| Config::new("arn:demo:agent-jobs"));

    // 2. An agent that takes a while
    let agent: AgentRef = AgentFn::arc("reporter", |input: String, ctx: CancellationToken| async move {
        for step in ["collecting", "aggregating", "writing"] {
            if ctx.is_cancelled() {
                return Err(AgentError::new("report cancelled"));
            }
            println!("[agent] {step}");
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Ok(format!("Analytics report for: {input}\nvisits=1234 signups=56"))
    });

    // 3. Host adapters
    let transport = Arc::new(MemoryTransport::new());
    let tracker = Arc::new(BusyTracker::new());

    let dispatcher = DispatcherBuilder::new(cfg, agent, transport.clone())
        .with_liveness_host(tracker.clone())
        .with_subscribers(vec![Arc::new(ConsoleSubscriber)])
        .build()?;

    // 4. The scheduler's request
    let ack = dispatcher
        .accept_json(r#"{"action":"start","job_id":"daily-report","input":"Generate analytics report"}"#)
        .await?;
    println!("[caller] ack: {}", serde_json::to_string(&ack)?);
    println!("[host] ping: {:?}", tracker.ping_status());

    // 5. Wait for the background job and inspect the notification
    dispatcher.wait_idle().await;
    println!("[host] ping: {:?}", tracker.ping_status());
    for msg in transport.sent() {
        println!("[topic] {}\n{}", msg.subject, msg.body);
    }

    dispatcher.shutdown().await?;
    Ok(())
}
