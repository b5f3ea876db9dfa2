//! # Coordination Loop
//!
//! All broker state lives in [`BrokerCore`] and is only touched by the task
//! running [`BrokerCore::run`]. Callers talk to it through `BrokerHandle`;
//! gate providers answer through the same command queue, so every state
//! change is serialized without locks.

use crate::domain::{
    BrokerConfig, BrokerError, BrokerStatus, Channel, ChannelId, ChannelTable, ConnectError,
    ContextState, DeferredClose, Endpoint, GateStage, NativeHostPolicy, OpenChannelRequest,
    PendingConnection, PendingMessage, PendingQueueStore, PolicyPermission, PortId,
    PortIdAllocator,
};
use crate::ports::{ContextDirectory, NativeHostLauncher, NativeLaunchRequest};
use crate::service::commands::{BrokerCommand, GateResolution};
use crate::service::gate_chain::{ChainStep, GateChain};
use crate::service::router::MessageRouter;
use crate::service::BrokerPorts;
use broker_telemetry::{log_channel_event, log_context_event};
use shared_bus::{BusEvent, EventPublisher};
use shared_types::{ContextId, Message, SourceContext};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

const COMPONENT: &str = "broker";

/// A connection suspended at an asynchronous gate.
#[derive(Debug)]
struct PendingEntry {
    connection: PendingConnection,
    stage: GateStage,
}

pub(crate) struct BrokerCore {
    table: ChannelTable,
    queues: PendingQueueStore,
    pending: HashMap<ChannelId, PendingEntry>,
    router: MessageRouter,
    gates: GateChain,
    contexts: Arc<dyn ContextDirectory>,
    native_hosts: Arc<dyn NativeHostLauncher>,
    native_policy: NativeHostPolicy,
    allocator: Arc<PortIdAllocator>,
    publisher: Option<Arc<dyn EventPublisher>>,
    outbox: Vec<BusEvent>,
    /// Weak so that dropping every handle stops the loop.
    commands: mpsc::WeakUnboundedSender<BrokerCommand>,
}

impl BrokerCore {
    pub(crate) fn new(
        config: &BrokerConfig,
        ports: BrokerPorts,
        allocator: Arc<PortIdAllocator>,
        publisher: Option<Arc<dyn EventPublisher>>,
        commands: mpsc::WeakUnboundedSender<BrokerCommand>,
    ) -> Self {
        let gates = GateChain::new(
            ports.targets,
            ports.consent,
            ports.secrets,
            ports.activation,
            config.activation_timeout,
        );
        Self {
            table: ChannelTable::new(),
            queues: PendingQueueStore::new(),
            pending: HashMap::new(),
            router: MessageRouter::new(ports.dispatcher),
            gates,
            contexts: ports.contexts,
            native_hosts: ports.native_hosts,
            native_policy: config.native_host_policy.clone(),
            allocator,
            publisher: publisher.filter(|_| config.publish_channel_events),
            outbox: Vec::new(),
            commands,
        }
    }

    /// Process commands until shutdown or until every sender is gone.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<BrokerCommand>) {
        info!(component = COMPONENT, "Broker coordination loop started");

        while let Some(command) = commands.recv().await {
            trace!(command = command.name(), "Processing command");
            let keep_running = self.handle(command);
            self.flush_events().await;
            if !keep_running {
                break;
            }
        }

        info!(
            component = COMPONENT,
            open_channels = self.table.len(),
            pending = self.pending.len(),
            "Broker coordination loop stopped"
        );
    }

    fn handle(&mut self, command: BrokerCommand) -> bool {
        match command {
            BrokerCommand::OpenChannel {
                receiver_port,
                request,
            } => self.open_channel(receiver_port, request),
            BrokerCommand::OpenChannelToContext {
                receiver_port,
                source,
                target_context,
                channel_name,
            } => self.open_channel_to_context(receiver_port, source, target_context, channel_name),
            BrokerCommand::OpenChannelToNativeHost {
                receiver_port,
                source,
                host_name,
            } => self.open_channel_to_native_host(receiver_port, source, host_name),
            BrokerCommand::PostMessage {
                source_port,
                message,
            } => self.post_message(source_port, message),
            BrokerCommand::CloseChannel { port, reason } => self.close_channel(port, reason),
            BrokerCommand::ContextTerminated { context } => self.context_terminated(context),
            BrokerCommand::GateResolved {
                channel_id,
                resolution,
            } => self.gate_resolved(channel_id, resolution),
            BrokerCommand::Status { reply } => {
                if reply.send(self.status()).is_err() {
                    debug!("Status requester went away");
                }
            }
            BrokerCommand::Shutdown => return false,
        }
        true
    }

    // =========================================================================
    // OPENING
    // =========================================================================

    fn open_channel(&mut self, receiver_port: PortId, request: OpenChannelRequest) {
        let channel_id = receiver_port.channel_id();
        if self.source_is_gone(&request.source) {
            return;
        }

        let mut connection = PendingConnection::for_target(channel_id, request);
        log_channel_event!(
            debug,
            COMPONENT,
            "Connection requested",
            channel_id,
            context = %connection.source.context,
            stage = GateStage::PermissionCheck.label()
        );

        if let Err(err) = self.gates.check_permission(&mut connection) {
            self.reject(connection, err);
            return;
        }
        self.proceed(connection, GateStage::PermissionCheck);
    }

    fn open_channel_to_context(
        &mut self,
        receiver_port: PortId,
        source: SourceContext,
        target_context: ContextId,
        channel_name: String,
    ) {
        let channel_id = receiver_port.channel_id();
        if self.source_is_gone(&source) {
            return;
        }

        let connection = PendingConnection::direct(channel_id, source, channel_name);
        match self.contexts.context_state(target_context) {
            ContextState::Live => self.open(connection, target_context),
            state => {
                debug!(
                    channel_id = %channel_id,
                    context = %target_context,
                    state = ?state,
                    "Target context cannot host endpoints"
                );
                self.reject(connection, ConnectError::TargetAbsent);
            }
        }
    }

    fn open_channel_to_native_host(
        &mut self,
        receiver_port: PortId,
        source: SourceContext,
        host_name: String,
    ) {
        let channel_id = receiver_port.channel_id();
        if self.source_is_gone(&source) {
            return;
        }

        let connection = PendingConnection::direct(channel_id, source, host_name.clone());
        let Some(identity) = connection.source.identity.clone() else {
            self.reject(connection, ConnectError::MissingPermission);
            return;
        };
        if !self.native_hosts.has_native_messaging_permission(&identity) {
            self.reject(connection, ConnectError::MissingPermission);
            return;
        }

        let permission = self.native_policy.evaluate(&host_name);
        if permission == PolicyPermission::Disallow {
            self.reject(connection, ConnectError::PolicyProhibited);
            return;
        }

        let request = NativeLaunchRequest {
            source_context: connection.source.context,
            source_identity: identity,
            host_name,
            allow_user_level: permission == PolicyPermission::AllowAll,
        };
        match self.native_hosts.launch(&request) {
            Ok(host_context) => self.open(connection, host_context),
            Err(reason) => self.reject(connection, ConnectError::NativeHostLaunchFailed(reason)),
        }
    }

    fn source_is_gone(&self, source: &SourceContext) -> bool {
        let gone = self.contexts.context_state(source.context) == ContextState::Gone;
        if gone {
            log_context_event!(
                debug,
                COMPONENT,
                "Opener context is gone, ignoring request",
                source.context
            );
        }
        gone
    }

    // =========================================================================
    // GATE CHAIN
    // =========================================================================

    fn proceed(&mut self, connection: PendingConnection, completed: GateStage) {
        match self.gates.advance(&connection, completed) {
            ChainStep::Deny(err) => self.reject(connection, err),
            ChainStep::Defer(stage) => self.defer(connection, stage),
            ChainStep::Open(receiver) => self.open(connection, receiver),
        }
    }

    fn defer(&mut self, connection: PendingConnection, stage: GateStage) {
        let channel_id = connection.channel_id;
        let Some(bucket) = stage.queue_bucket() else {
            error!(channel_id = %channel_id, stage = stage.label(), "Deferred at a non-deferrable stage");
            self.reject(connection, ConnectError::TargetAbsent);
            return;
        };

        let queued = match self.queues.bucket_of(channel_id) {
            Some(from) => self.queues.transfer(channel_id, from, bucket),
            None => self.queues.register(channel_id, bucket).map(|()| 0),
        };
        if let Err(err) = queued {
            error!(channel_id = %channel_id, error = %err, "Pending queue out of sync");
        }

        let Some(commands) = self.commands.upgrade() else {
            debug!(channel_id = %channel_id, "Broker shutting down, dropping deferred connection");
            self.queues.discard(channel_id);
            return;
        };
        self.gates.spawn_stage(stage, &connection, commands);

        log_channel_event!(debug, COMPONENT, "Connection deferred", channel_id, stage = stage.label());
        self.pending.insert(channel_id, PendingEntry { connection, stage });
        self.update_pending_gauge();
    }

    fn gate_resolved(&mut self, channel_id: ChannelId, resolution: GateResolution) {
        let Some(entry) = self.pending.remove(&channel_id) else {
            debug!(channel_id = %channel_id, "Resolution for abandoned connection ignored");
            return;
        };
        if entry.stage != resolution.stage() {
            error!(
                channel_id = %channel_id,
                expected = entry.stage.label(),
                got = resolution.stage().label(),
                "Gate resolution for the wrong stage"
            );
            self.pending.insert(channel_id, entry);
            return;
        }
        self.update_pending_gauge();

        let mut connection = entry.connection;
        match resolution {
            GateResolution::Consent(true) => self.proceed(connection, GateStage::AwaitingConsent),
            GateResolution::Consent(false) => self.reject(connection, ConnectError::ConsentDenied),
            GateResolution::Secret(Ok(secret)) => {
                connection.secret = Some(secret);
                self.proceed(connection, GateStage::AwaitingSecret);
            }
            GateResolution::Secret(Err(reason)) => {
                self.reject(connection, ConnectError::SecretDerivationFailed(reason));
            }
            GateResolution::Activation(None) => {
                self.reject(connection, ConnectError::TargetActivationAbandoned);
            }
            GateResolution::Activation(Some(host)) => {
                if !self.contexts.context_state(connection.source.context).is_live() {
                    self.reject(connection, ConnectError::TargetActivationAbandoned);
                    return;
                }
                connection.receiver_context = Some(host);
                self.proceed(connection, GateStage::AwaitingActivation);
            }
        }
    }

    fn open(&mut self, connection: PendingConnection, receiver: ContextId) {
        let channel_id = connection.channel_id;
        let queued = match self.queues.bucket_of(channel_id) {
            Some(bucket) => self.queues.drain(channel_id, bucket).unwrap_or_else(|err| {
                error!(channel_id = %channel_id, error = %err, "Pending queue out of sync");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let opener = connection.source.context;
        let channel = Channel::new(channel_id, Endpoint::new(opener), Endpoint::new(receiver));
        if let Err(err) = self.router.open(&mut self.table, channel) {
            error!(channel_id = %channel_id, error = %err, "Channel id collision");
            panic!("{err}");
        }

        log_channel_event!(
            info,
            COMPONENT,
            "Channel opened",
            channel_id,
            opener = %opener,
            receiver = %receiver,
            flushed = queued.len()
        );
        crate::metrics::record_channel_opened();

        self.router
            .connect(receiver, connection.receiver_port(), &connection.connect_info());
        for PendingMessage {
            source_port,
            message,
        } in &queued
        {
            self.router.route(&self.table, *source_port, message);
        }
        self.emit(BusEvent::ChannelOpened {
            channel_id: channel_id.raw(),
            opener,
            receiver,
        });

        if let Some(DeferredClose { port, reason }) = connection.deferred_close {
            self.close_open_channel(port, &reason);
        }
    }

    fn reject(&mut self, connection: PendingConnection, err: ConnectError) {
        let channel_id = connection.channel_id;
        let dropped = self.queues.discard(channel_id);
        crate::metrics::record_connection_rejected(err.kind_label());

        match err.disconnect_reason() {
            Some(reason) => {
                log_channel_event!(
                    info,
                    COMPONENT,
                    "Connection rejected",
                    channel_id,
                    kind = err.kind_label(),
                    reason = %reason,
                    dropped_messages = dropped
                );
                self.router
                    .disconnect(connection.source.context, connection.opener_port(), &reason);
                self.emit(BusEvent::ConnectionRejected {
                    channel_id: channel_id.raw(),
                    opener: connection.source.context,
                    kind: err.kind_label().to_string(),
                });
            }
            None => {
                log_channel_event!(
                    debug,
                    COMPONENT,
                    "Connection abandoned",
                    channel_id,
                    kind = err.kind_label(),
                    dropped_messages = dropped
                );
            }
        }
        self.update_pending_gauge();
    }

    // =========================================================================
    // TRAFFIC AND TEARDOWN
    // =========================================================================

    fn post_message(&mut self, source_port: PortId, message: Message) {
        if self.router.route(&self.table, source_port, &message) {
            return;
        }

        let channel_id = source_port.channel_id();
        let closing = self
            .pending
            .get(&channel_id)
            .is_some_and(|entry| entry.connection.deferred_close.is_some());
        if closing {
            debug!(channel_id = %channel_id, "Message posted after close dropped");
            crate::metrics::record_message_dropped();
            return;
        }

        if let Some(bucket) = self.queues.bucket_of(channel_id) {
            let pending = PendingMessage {
                source_port,
                message,
            };
            match self.queues.enqueue(channel_id, bucket, pending) {
                Ok(len) => {
                    trace!(channel_id = %channel_id, queued = len, "Message queued");
                    crate::metrics::record_message_queued();
                }
                Err(err) => error!(channel_id = %channel_id, error = %err, "Pending queue out of sync"),
            }
            return;
        }

        debug!(error = %BrokerError::UnknownPortId(source_port), "Message dropped");
        crate::metrics::record_message_dropped();
    }

    fn close_channel(&mut self, port: PortId, reason: String) {
        let channel_id = port.channel_id();
        if self.table.contains(channel_id) {
            self.close_open_channel(port, &reason);
        } else if let Some(entry) = self.pending.get_mut(&channel_id) {
            debug!(channel_id = %channel_id, "Close deferred until negotiation ends");
            entry.connection.deferred_close = Some(DeferredClose { port, reason });
        } else {
            debug!(error = %BrokerError::UnknownPortId(port), "Close ignored");
        }
    }

    fn close_open_channel(&mut self, port: PortId, reason: &str) {
        let channel_id = port.channel_id();
        if self.router.close(&mut self.table, channel_id, port, reason, true) {
            self.emit(BusEvent::ChannelClosed {
                channel_id: channel_id.raw(),
                closing_port: port.raw(),
                peer_notified: true,
            });
        }
    }

    fn context_terminated(&mut self, context: ContextId) {
        let closes = self.table.hosted_by(context);
        let closed = closes.len();
        for close in closes {
            if self.router.close(
                &mut self.table,
                close.channel_id,
                close.closing_port,
                "",
                close.notify_peer,
            ) {
                self.emit(BusEvent::ChannelClosed {
                    channel_id: close.channel_id.raw(),
                    closing_port: close.closing_port.raw(),
                    peer_notified: close.notify_peer,
                });
            }
        }

        let abandoned: Vec<ChannelId> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.connection.source.context == context)
            .map(|(id, _)| *id)
            .collect();
        let abandoned_count = abandoned.len();
        for channel_id in abandoned {
            if let Some(entry) = self.pending.remove(&channel_id) {
                self.reject(entry.connection, ConnectError::TargetActivationAbandoned);
            }
        }

        log_context_event!(
            info,
            COMPONENT,
            "Context terminated",
            context,
            closed_channels = closed,
            abandoned_requests = abandoned_count
        );
    }

    // =========================================================================
    // BOOKKEEPING
    // =========================================================================

    fn status(&self) -> BrokerStatus {
        let mut pending_by_stage = BTreeMap::new();
        for entry in self.pending.values() {
            *pending_by_stage.entry(entry.stage).or_insert(0) += 1;
        }
        BrokerStatus {
            open_channels: self.table.len(),
            pending_by_stage,
            queued_messages: self.queues.total_messages(),
            keepalive: self.table.keepalive_snapshot(),
            port_id_wraps: self.allocator.wrap_count(),
        }
    }

    fn emit(&mut self, event: BusEvent) {
        if self.publisher.is_some() {
            self.outbox.push(event);
        }
    }

    async fn flush_events(&mut self) {
        let Some(publisher) = self.publisher.as_ref() else {
            return;
        };
        for event in self.outbox.drain(..) {
            if publisher.publish(event).await == 0 {
                trace!("Channel event had no subscribers");
            }
        }
    }

    fn update_pending_gauge(&self) {
        crate::metrics::set_pending_connections(self.pending.len());
    }
}

impl Drop for BrokerCore {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Broker stopped with connections still negotiating"
            );
        }
    }
}
