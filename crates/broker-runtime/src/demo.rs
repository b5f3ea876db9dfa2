//! Scripted walk through the broker using the in-memory adapters.
//!
//! The binary runs this on startup so a fresh checkout shows a channel
//! opening, traffic queued behind activation, a refusal and a teardown in
//! its logs.

use std::time::Duration;

use anyhow::{ensure, Context, Result};
use mc_broker::adapters::{Delivery, InMemoryEnvironment};
use mc_broker::{
    ExternallyConnectable, MessageBrokerApi, OpenChannelRequest, PortId, TargetDescriptor,
    UrlPattern,
};
use shared_bus::TerminationCause;
use shared_types::{ContextId, Message, SourceContext, TargetId};
use tracing::info;

use crate::BrokerRuntime;

pub const ECHO_TARGET: &str = "demo.echo";
pub const LAZY_TARGET: &str = "demo.lazy";
pub const EXTENSION_CONTEXT: ContextId = ContextId(1);
pub const PAGE_CONTEXT: ContextId = ContextId(2);
pub const ECHO_CONTEXT: ContextId = ContextId(100);
pub const LAZY_CONTEXT: ContextId = ContextId(101);

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

/// What the demo observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub messages_delivered: usize,
    pub refusals: usize,
    pub open_after_teardown: usize,
}

/// Install the demo targets.
pub fn seed(env: &InMemoryEnvironment) -> Result<()> {
    let pattern = UrlPattern::parse("https://*.example.com/*").context("demo URL pattern")?;
    env.targets.install(
        TargetDescriptor::new(ECHO_TARGET).with_externally_connectable(ExternallyConnectable {
            ids: vec!["*".to_string()],
            matches: vec![pattern],
            accepts_secret: false,
        }),
    );
    env.activation.set_resident(ECHO_TARGET, ECHO_CONTEXT);

    env.targets.install(TargetDescriptor::new(LAZY_TARGET));
    env.activation.enable_activation(LAZY_TARGET);
    Ok(())
}

/// Drive the scenario against a runtime built on `env`.
pub async fn run(runtime: &BrokerRuntime, env: &InMemoryEnvironment) -> Result<DemoReport> {
    let broker = runtime.broker();
    let extension = SourceContext::identity(EXTENSION_CONTEXT, "demo.extension");

    let echo = broker.open_channel(OpenChannelRequest::new(extension.clone(), ECHO_TARGET, "echo"))?;
    broker.post_message(echo, Message::new("hello echo"))?;

    // Traffic posted before activation completes is held and flushed on open.
    let lazy = broker.open_channel(OpenChannelRequest::new(extension, LAZY_TARGET, "lazy"))?;
    broker.post_message(lazy, Message::new("first"))?;
    broker.post_message(lazy, Message::new("second"))?;
    env.activation
        .complete(&TargetId::from(LAZY_TARGET), Some(LAZY_CONTEXT));

    let stranger = SourceContext::web_page(PAGE_CONTEXT, "https://elsewhere.test/");
    let refused = broker.open_channel(OpenChannelRequest::new(stranger, ECHO_TARGET, ""))?;

    let delivered = env
        .dispatcher
        .wait_until(STEP_TIMEOUT, |d| {
            count(d, lazy.opposite(), is_message) == 2 && count(d, refused, is_disconnect) == 1
        })
        .await;
    ensure!(delivered, "demo traffic was not delivered in time");

    let status = runtime.status().await?;
    info!(
        open_channels = status.open_channels,
        pending = status.pending_connections(),
        "Demo channels negotiated"
    );

    runtime
        .context_terminated(ECHO_CONTEXT, TerminationCause::Terminated)
        .await;
    let torn_down = env
        .dispatcher
        .wait_until(STEP_TIMEOUT, |d| count(d, echo, is_disconnect) == 1)
        .await;
    ensure!(torn_down, "demo teardown did not reach the opener");

    let status = runtime.status().await?;
    let report = DemoReport {
        messages_delivered: env.dispatcher.messages_to(echo.opposite()).len()
            + env.dispatcher.messages_to(lazy.opposite()).len(),
        refusals: env.dispatcher.disconnects_to(refused).len(),
        open_after_teardown: status.open_channels,
    };
    info!(?report, "Demo finished");
    Ok(report)
}

fn is_message(delivery: &Delivery) -> bool {
    matches!(delivery, Delivery::Message { .. })
}

fn is_disconnect(delivery: &Delivery) -> bool {
    matches!(delivery, Delivery::Disconnect { .. })
}

fn count(deliveries: &[Delivery], port: PortId, kind: fn(&Delivery) -> bool) -> usize {
    deliveries
        .iter()
        .filter(|d| d.port() == port && kind(d))
        .count()
}
