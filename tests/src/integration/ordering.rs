//! # Ordering Under Load
//!
//! Per-channel order holds no matter how callers and channels interleave.
//! Nothing is promised across channels.

#[cfg(test)]
mod tests {
    use mc_broker::{MessageBrokerApi, OpenChannelRequest, PortId};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared_types::{ContextId, Message, TargetId};

    use crate::fixtures::{count, extension, is_message, BrokerFixture};

    const HOST: ContextId = ContextId(100);

    fn expected(tag: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{tag}-{i}")).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_keep_their_order() {
        const CALLERS: u64 = 8;
        const MESSAGES: usize = 50;

        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);

        let mut tasks = Vec::new();
        for caller in 0..CALLERS {
            let broker = fx.broker();
            tasks.push(tokio::spawn(async move {
                let opener = broker
                    .open_channel(OpenChannelRequest::new(
                        extension(caller + 1, "src"),
                        "target",
                        "",
                    ))
                    .unwrap();
                for i in 0..MESSAGES {
                    broker
                        .post_message(opener, Message::new(format!("c{caller}-{i}")))
                        .unwrap();
                }
                (caller, opener)
            }));
        }

        let mut openers = Vec::new();
        for task in tasks {
            openers.push(task.await.unwrap());
        }
        fx.settle().await;

        for (caller, opener) in openers {
            assert_eq!(
                fx.env.dispatcher.messages_to(opener.opposite()),
                expected(&format!("c{caller}"), MESSAGES)
            );
        }
        assert_eq!(fx.settle().await.open_channels, CALLERS as usize);
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_random_interleaving_across_pending_and_open_channels() {
        const CHANNELS: usize = 6;
        const POSTS: usize = 300;

        let fx = BrokerFixture::start();
        fx.resident_target("resident", HOST);
        fx.lazy_target("lazy");
        let broker = fx.broker();

        // Even channels go to the resident target, odd ones wait on activation.
        let openers: Vec<PortId> = (0..CHANNELS)
            .map(|i| {
                let target = if i % 2 == 0 { "resident" } else { "lazy" };
                broker
                    .open_channel(OpenChannelRequest::new(extension(1, "src"), target, ""))
                    .unwrap()
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut sent = vec![0usize; CHANNELS];
        for step in 0..POSTS {
            let channel = rng.gen_range(0..CHANNELS);
            let port = openers[channel];
            broker
                .post_message(port, Message::new(format!("ch{channel}-{}", sent[channel])))
                .unwrap();
            sent[channel] += 1;

            if step == POSTS / 2 {
                for _ in 0..CHANNELS / 2 {
                    fx.env.activation.complete(&TargetId::from("lazy"), Some(ContextId(101)));
                }
            }
        }

        let total: usize = sent.iter().sum();
        let receivers: Vec<PortId> = openers.iter().map(|p| p.opposite()).collect();
        fx.wait_for(|d| {
            receivers.iter().map(|r| count(d, *r, is_message)).sum::<usize>() == total
        })
        .await;

        for (channel, port) in openers.iter().enumerate() {
            assert_eq!(
                fx.env.dispatcher.messages_to(port.opposite()),
                expected(&format!("ch{channel}"), sent[channel]),
                "channel {channel}"
            );
        }
        fx.shutdown().await;
    }

    #[tokio::test]
    async fn test_both_directions_interleaved() {
        let fx = BrokerFixture::start();
        fx.resident_target("target", HOST);
        let broker = fx.broker();

        let opener = broker
            .open_channel(OpenChannelRequest::new(extension(1, "src"), "target", ""))
            .unwrap();
        for i in 0..20 {
            broker.post_message(opener, Message::new(format!("up-{i}"))).unwrap();
            broker
                .post_message(opener.opposite(), Message::new(format!("down-{i}")))
                .unwrap();
        }
        fx.settle().await;

        assert_eq!(fx.env.dispatcher.messages_to(opener.opposite()), expected("up", 20));
        assert_eq!(fx.env.dispatcher.messages_to(opener), expected("down", 20));
        fx.shutdown().await;
    }
}
