//! # Gate Chain
//!
//! Sequences the gates for one pending connection. Synchronous checks run
//! inline on the coordination loop; a deferred gate is handed to a spawned
//! task whose answer comes back as [`BrokerCommand::GateResolved`].

use crate::domain::{
    check_consent, check_permission, check_secret, decide_activation, ActivationDecision,
    ConnectError, GateOutcome, GateStage, PendingConnection, TargetDescriptor,
};
use crate::ports::{
    ActivationProvider, ConsentPrompt, ConsentRequest, SecretProvider, SecretRequest,
    TargetRegistry,
};
use crate::service::commands::{BrokerCommand, GateResolution};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Next step for a pending connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChainStep {
    Deny(ConnectError),
    Defer(GateStage),
    /// Every gate passed; open with this receiver context.
    Open(shared_types::ContextId),
}

pub(crate) struct GateChain {
    targets: Arc<dyn TargetRegistry>,
    consent: Arc<dyn ConsentPrompt>,
    secrets: Arc<dyn SecretProvider>,
    activation: Arc<dyn ActivationProvider>,
    activation_timeout: Duration,
}

impl GateChain {
    pub(crate) fn new(
        targets: Arc<dyn TargetRegistry>,
        consent: Arc<dyn ConsentPrompt>,
        secrets: Arc<dyn SecretProvider>,
        activation: Arc<dyn ActivationProvider>,
        activation_timeout: Duration,
    ) -> Self {
        Self {
            targets,
            consent,
            secrets,
            activation,
            activation_timeout,
        }
    }

    /// Run the permission gate, recording its grant on `connection`.
    pub(crate) fn check_permission(
        &self,
        connection: &mut PendingConnection,
    ) -> Result<(), ConnectError> {
        let target = self.resolve(connection)?;
        let grant = check_permission(&connection.source, Some(&target), connection.wants_secret)?;
        connection.is_web_connection = grant.is_web_connection;
        connection.wants_secret = grant.keep_secret;
        Ok(())
    }

    /// Evaluate every gate after `completed`, stopping at the first that
    /// denies or defers.
    pub(crate) fn advance(&self, connection: &PendingConnection, completed: GateStage) -> ChainStep {
        for stage in GateStage::DEFERRABLE.into_iter().filter(|s| *s > completed) {
            let target = match self.resolve(connection) {
                Ok(target) => target,
                Err(err) => return ChainStep::Deny(err),
            };

            let outcome = match stage {
                GateStage::AwaitingConsent => check_consent(connection, &target),
                GateStage::AwaitingSecret => check_secret(connection),
                GateStage::AwaitingActivation => {
                    return match decide_activation(
                        self.activation.resident_context(&target.id),
                        self.activation.supports_activation(&target.id),
                    ) {
                        ActivationDecision::Resident(context) => ChainStep::Open(context),
                        ActivationDecision::Activate => {
                            ChainStep::Defer(GateStage::AwaitingActivation)
                        }
                        ActivationDecision::Unavailable => {
                            ChainStep::Deny(ConnectError::TargetAbsent)
                        }
                    };
                }
                GateStage::PermissionCheck => GateOutcome::Allow,
            };

            match outcome {
                GateOutcome::Allow => {
                    debug!(channel_id = %connection.channel_id, stage = stage.label(), "Gate passed");
                }
                GateOutcome::Deny(err) => return ChainStep::Deny(err),
                GateOutcome::Defer(stage) => return ChainStep::Defer(stage),
            }
        }

        // Only reachable once activation itself has completed.
        match connection.receiver_context {
            Some(context) => ChainStep::Open(context),
            None => ChainStep::Deny(ConnectError::TargetAbsent),
        }
    }

    /// Start the provider call for a deferred stage.
    pub(crate) fn spawn_stage(
        &self,
        stage: GateStage,
        connection: &PendingConnection,
        commands: mpsc::UnboundedSender<BrokerCommand>,
    ) {
        let channel_id = connection.channel_id;
        let send = move |resolution: GateResolution| {
            if commands
                .send(BrokerCommand::GateResolved {
                    channel_id,
                    resolution,
                })
                .is_err()
            {
                debug!(channel_id = %channel_id, "Broker loop gone, dropping gate resolution");
            }
        };

        match stage {
            GateStage::AwaitingConsent => {
                let consent = Arc::clone(&self.consent);
                let request = ConsentRequest {
                    target: connection.target.clone().unwrap_or_default(),
                    source_context: connection.source.context,
                    source_url: connection.source.url.clone(),
                    origin: connection.source.origin.clone(),
                };
                tokio::spawn(async move {
                    let allowed = consent.request_consent(request).await;
                    send(GateResolution::Consent(allowed));
                });
            }
            GateStage::AwaitingSecret => {
                let secrets = Arc::clone(&self.secrets);
                let request = SecretRequest {
                    source_context: connection.source.context,
                    source_url: connection.source.url.clone(),
                };
                tokio::spawn(async move {
                    let secret = secrets.derive_secret(request).await;
                    send(GateResolution::Secret(secret));
                });
            }
            GateStage::AwaitingActivation => {
                let activation = Arc::clone(&self.activation);
                let target = connection.target.clone().unwrap_or_default();
                let limit = self.activation_timeout;
                tokio::spawn(async move {
                    let host = match tokio::time::timeout(limit, activation.activate(&target)).await {
                        Ok(host) => host,
                        Err(_) => {
                            warn!(
                                channel_id = %channel_id,
                                target = %target,
                                timeout_ms = limit.as_millis() as u64,
                                "Target activation timed out"
                            );
                            None
                        }
                    };
                    send(GateResolution::Activation(host));
                });
            }
            GateStage::PermissionCheck => {
                warn!(stage = stage.label(), "Stage cannot be deferred");
            }
        }
    }

    fn resolve(&self, connection: &PendingConnection) -> Result<TargetDescriptor, ConnectError> {
        connection
            .target
            .as_ref()
            .and_then(|target| self.targets.lookup(target))
            .ok_or(ConnectError::TargetAbsent)
    }
}
