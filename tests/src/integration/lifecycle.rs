//! # Lifecycle Teardown
//!
//! Termination events published on the shared bus reach the broker through
//! the lifecycle monitor and close every channel the context touched.

#[cfg(test)]
mod tests {
    use mc_broker::{MessageBrokerApi, OpenChannelRequest};
    use shared_bus::{BusEvent, EventFilter, EventTopic, TerminationCause};
    use shared_types::{ContextId, Message, TargetId};

    use crate::fixtures::{count, extension, is_disconnect, BrokerFixture};

    const HOST: ContextId = ContextId(100);

    #[tokio::test]
    async fn test_receiver_host_termination_notifies_openers() {
        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);
        fx.resident_target("other", ContextId(200));
        let broker = fx.broker();

        let a = broker
            .open_channel(OpenChannelRequest::new(extension(1, "a"), "target", ""))
            .unwrap();
        let b = broker
            .open_channel(OpenChannelRequest::new(extension(2, "b"), "target", ""))
            .unwrap();
        let unrelated = broker
            .open_channel(OpenChannelRequest::new(extension(1, "a"), "other", ""))
            .unwrap();
        assert_eq!(fx.settle().await.open_channels, 3);

        fx.terminate(HOST).await;
        let status = fx.wait_for_status(|s| s.open_channels == 1).await;

        assert_eq!(status.open_channels, 1);
        assert!(!status.keepalive.contains_key(&HOST));
        assert_eq!(status.keepalive.get(&ContextId(1)), Some(&1));
        assert_eq!(fx.env.dispatcher.disconnects_to(a), vec![""]);
        assert_eq!(fx.env.dispatcher.disconnects_to(b), vec![""]);
        assert!(fx.env.dispatcher.disconnects_to(unrelated).is_empty());

        broker.post_message(unrelated, Message::new("still here")).unwrap();
        fx.settle().await;
        assert_eq!(
            fx.env.dispatcher.messages_to(unrelated.opposite()),
            vec!["still here"]
        );
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_opener_closed_notifies_receiver() {
        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);
        let opener = fx
            .broker()
            .open_channel(OpenChannelRequest::new(extension(1, "a"), "target", ""))
            .unwrap();
        fx.settle().await;

        fx.runtime
            .context_terminated(ContextId(1), TerminationCause::Closed)
            .await;
        fx.wait_for(|d| count(d, opener.opposite(), is_disconnect) == 1)
            .await;

        assert_eq!(fx.env.dispatcher.disconnects_to(opener.opposite()), vec![""]);
        assert!(fx.env.dispatcher.disconnects_to(opener).is_empty());
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_pending_request_abandoned_with_its_source() {
        let fx = BrokerFixture::start();
        fx.lazy_target("lazy");
        let broker = fx.broker();

        broker
            .open_channel(OpenChannelRequest::new(extension(3, "src"), "lazy", ""))
            .unwrap();
        assert_eq!(fx.settle().await.pending_connections(), 1);

        fx.terminate(ContextId(3)).await;
        fx.wait_for_status(|s| s.pending_connections() == 0).await;

        fx.env.activation.complete(&TargetId::from("lazy"), Some(HOST));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let status = fx.settle().await;
        assert_eq!(status.open_channels, 0);
        assert!(fx.env.dispatcher.deliveries().is_empty());
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_channel_events_observable_on_bus() {
        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);
        let mut events = fx
            .runtime
            .bus()
            .subscribe(EventFilter::topics(vec![EventTopic::Channel]));

        fx.broker()
            .open_channel(OpenChannelRequest::new(extension(1, "a"), "target", ""))
            .unwrap();
        fx.settle().await;
        fx.terminate(HOST).await;

        let opened = events.recv().await.unwrap();
        assert!(matches!(
            opened,
            BusEvent::ChannelOpened { opener: ContextId(1), receiver: HOST, .. }
        ));
        let closed = events.recv().await.unwrap();
        assert!(matches!(closed, BusEvent::ChannelClosed { peer_notified: true, .. }));
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_monitor_unsubscribes_on_shutdown() {
        let fx = BrokerFixture::start();
        let bus = fx.runtime.bus();
        assert_eq!(bus.subscriber_count(), 1);

        fx.shutdown().await;
        assert_eq!(bus.subscriber_count(), 0);
    }
}
