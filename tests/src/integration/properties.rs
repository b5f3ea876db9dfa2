//! # Broker Guarantees
//!
//! One test per guarantee a host can rely on:
//!
//! | Guarantee | Test |
//! |-----------|------|
//! | Port pairs unique until the id space wraps | `test_port_pairs_unique_until_wrap` |
//! | `opposite` is an involution | `test_opposite_is_involution` |
//! | FIFO across the pending to open transition | `test_fifo_across_activation` |
//! | Close is idempotent | `test_close_is_idempotent` |
//! | Source gone during consent leaves no trace | `test_source_terminated_during_consent` |
//! | Connect precedes messages on an ungated open | `test_connect_before_messages` |
//! | Queued messages follow the connect | `test_activation_flush_sequence` |
//! | Missing target and refused origin look the same | `test_refusals_indistinguishable` |
//! | Loopback teardown is silent | `test_loopback_termination_silent` |

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mc_broker::adapters::Delivery;
    use mc_broker::{
        ExternallyConnectable, MessageBrokerApi, OpenChannelRequest, PortId, PortIdAllocator,
        TargetDescriptor, UrlPattern, RECEIVING_END_MISSING,
    };
    use shared_types::{ContextId, Message, SourceContext, TargetId};

    use crate::fixtures::{count, extension, is_connect, is_disconnect, is_message, BrokerFixture};

    const HOST: ContextId = ContextId(100);

    #[test]
    fn test_port_pairs_unique_until_wrap() {
        let allocator = PortIdAllocator::with_period(64);
        let mut seen = HashSet::new();

        for _ in 0..64 {
            let (opener, receiver) = allocator.allocate_pair();
            assert_eq!(opener.raw(), opener.channel_id().raw() * 2);
            assert_eq!(receiver.raw(), opener.raw() + 1);
            assert!(seen.insert(opener));
            assert!(seen.insert(receiver));
        }
        assert_eq!(allocator.wrap_count(), 0);

        let (opener, _) = allocator.allocate_pair();
        assert_eq!(opener, PortId::new(0));
        assert_eq!(allocator.wrap_count(), 1);
    }

    #[test]
    fn test_opposite_is_involution() {
        for raw in (0..10_000).chain([u32::MAX - 1, u32::MAX]) {
            let port = PortId::new(raw);
            assert_eq!(port.opposite().opposite(), port);
            assert_ne!(port.opposite(), port);
            assert_eq!(port.opposite().channel_id(), port.channel_id());
            assert_ne!(port.opposite().is_opener(), port.is_opener());
        }
    }

    #[tokio::test]
    async fn test_fifo_across_activation() {
        let fx = BrokerFixture::start();
        fx.lazy_target("lazy");
        let broker = fx.broker();

        let opener = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "lazy", ""))
            .unwrap();
        for i in 0..5 {
            broker.post_message(opener, Message::new(format!("m{i}"))).unwrap();
        }
        fx.settle().await;

        // Messages posted while the activation answer is in flight may land on
        // either side of the open; order must hold regardless.
        fx.env.activation.complete(&TargetId::from("lazy"), Some(HOST));
        for i in 5..10 {
            broker.post_message(opener, Message::new(format!("m{i}"))).unwrap();
        }

        let receiver = opener.opposite();
        fx.wait_for(|d| count(d, receiver, is_message) == 10).await;
        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(fx.env.dispatcher.messages_to(receiver), expected);
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);
        let broker = fx.broker();

        let opener = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "target", ""))
            .unwrap();
        broker.close_channel(opener, "first".into()).unwrap();
        broker.close_channel(opener.opposite(), "second".into()).unwrap();
        broker.close_channel(opener, "third".into()).unwrap();
        let status = fx.settle().await;

        let deliveries = fx.env.dispatcher.deliveries();
        assert_eq!(count(&deliveries, opener.opposite(), is_disconnect), 1);
        assert_eq!(count(&deliveries, opener, is_disconnect), 0);
        assert_eq!(fx.env.dispatcher.keepalive(ContextId(1)), 0);
        assert_eq!(fx.env.dispatcher.keepalive(HOST), 0);
        assert!(status.keepalive.is_empty());
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_source_terminated_during_consent() {
        let fx = BrokerFixture::start();
        fx.env.targets.install(
            TargetDescriptor::new("target").with_externally_connectable(ExternallyConnectable {
                ids: vec![],
                matches: vec![UrlPattern::parse("https://*/*").unwrap()],
                accepts_secret: false,
            }),
        );
        fx.env.activation.set_resident("target", HOST);
        let page = SourceContext::web_page(ContextId(7), "https://site.test/").restricted();

        let opener = fx
            .broker()
            .open_channel(OpenChannelRequest::new(page, "target", ""))
            .unwrap();
        fx.broker().post_message(opener, Message::new("queued")).unwrap();
        assert_eq!(fx.settle().await.pending_connections(), 1);

        fx.terminate(ContextId(7)).await;
        let status = fx.wait_for_status(|s| s.pending_connections() == 0).await;
        assert_eq!(status.pending_connections(), 0);
        assert_eq!(status.queued_messages, 0);

        fx.env.consent.answer(&TargetId::from("target"), true);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let status = fx.settle().await;

        assert_eq!(status.open_channels, 0);
        assert!(fx.env.dispatcher.deliveries().is_empty());
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_before_messages() {
        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);
        let broker = fx.broker();

        let opener = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "target", ""))
            .unwrap();
        broker.post_message(opener, Message::new("a")).unwrap();
        broker.post_message(opener, Message::new("b")).unwrap();
        fx.settle().await;

        let to_receiver = fx.env.dispatcher.deliveries_to(opener.opposite());
        assert_eq!(to_receiver.len(), 3);
        assert!(is_connect(&to_receiver[0]));
        assert_eq!(fx.env.dispatcher.messages_to(opener.opposite()), vec!["a", "b"]);
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_activation_flush_sequence() {
        let fx = BrokerFixture::start();
        fx.lazy_target("lazy");
        let broker = fx.broker();

        let opener = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "lazy", "chan"))
            .unwrap();
        broker.post_message(opener, Message::new("m1")).unwrap();
        broker.post_message(opener, Message::new("m2")).unwrap();
        fx.settle().await;
        fx.env.activation.complete(&TargetId::from("lazy"), Some(HOST));

        let receiver = opener.opposite();
        fx.wait_for(|d| count(d, receiver, is_message) == 2).await;
        let sequence = fx.env.dispatcher.deliveries_to(receiver);
        assert!(matches!(&sequence[0], Delivery::Connect { context, info, .. }
            if *context == HOST && info.channel_name == "chan"));
        assert!(matches!(&sequence[1], Delivery::Message { message, .. } if message.data == "m1"));
        assert!(matches!(&sequence[2], Delivery::Message { message, .. } if message.data == "m2"));
        assert_eq!(sequence.len(), 3);
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_refusals_indistinguishable() {
        let fx = BrokerFixture::start();
        fx.env.targets.install(
            TargetDescriptor::new("guarded").with_externally_connectable(ExternallyConnectable {
                ids: vec!["friend".into()],
                matches: vec![],
                accepts_secret: false,
            }),
        );
        fx.env.activation.set_resident("guarded", HOST);
        let broker = fx.broker();

        let missing = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "nowhere", ""))
            .unwrap();
        let refused = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "guarded", ""))
            .unwrap();
        let page = broker
            .open_channel(OpenChannelRequest::new(
                SourceContext::web_page(ContextId(2), "https://site.test/"),
                "guarded",
                "",
            ))
            .unwrap();
        fx.settle().await;

        for port in [missing, refused, page] {
            assert_eq!(fx.env.dispatcher.disconnects_to(port), vec![RECEIVING_END_MISSING]);
        }
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_loopback_termination_silent() {
        let fx = BrokerFixture::start();
        let context = ContextId(5);
        let opener = fx
            .broker()
            .open_channel_to_context(extension(5, "self"), context, "loop".into())
            .unwrap();
        fx.broker().post_message(opener, Message::new("echo")).unwrap();
        assert_eq!(fx.settle().await.open_channels, 1);

        fx.terminate(context).await;
        let status = fx.wait_for_status(|s| s.open_channels == 0).await;
        assert_eq!(status.open_channels, 0);

        let deliveries = fx.env.dispatcher.deliveries();
        assert_eq!(deliveries.iter().filter(|d| is_disconnect(d)).count(), 0);
        assert_eq!(fx.env.dispatcher.keepalive(context), 0);
        fx.shutdown().await;
    }
}
