//! Routes inbound publications to local subscribers by topic filter.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use hamqtt_domain::connection::InboundMessage;

struct Route {
    filter: String,
    sender: mpsc::UnboundedSender<InboundMessage>,
}

/// Filter → queue table shared between the client and its event loop.
#[derive(Default)]
pub(crate) struct SubscriptionRouter {
    routes: Mutex<Vec<Route>>,
}

impl SubscriptionRouter {
    /// Open a queue for `filter`, replacing any existing one.
    pub(crate) fn add(&self, filter: &str) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut routes = self.lock();
        routes.retain(|route| route.filter != filter && !route.sender.is_closed());
        routes.push(Route {
            filter: filter.to_string(),
            sender,
        });
        receiver
    }

    pub(crate) fn remove(&self, filter: &str) {
        self.lock().retain(|route| route.filter != filter);
    }

    /// Filters whose queue is still open.
    pub(crate) fn filters(&self) -> Vec<String> {
        let mut routes = self.lock();
        routes.retain(|route| !route.sender.is_closed());
        routes.iter().map(|route| route.filter.clone()).collect()
    }

    /// Hand `message` to every matching queue without waiting.
    ///
    /// Queues are unbounded so the event loop never blocks on a slow
    /// subscriber and never drops a publication it has already acked.
    /// Returns the number of queues that accepted it.
    pub(crate) fn dispatch(&self, message: &InboundMessage) -> usize {
        let mut routes = self.lock();
        let mut delivered = 0;
        routes.retain(|route| {
            if !rumqttc::matches(&message.topic, &route.filter) {
                return !route.sender.is_closed();
            }
            let open = route.sender.send(message.clone()).is_ok();
            delivered += usize::from(open);
            open
        });
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_deliver_to_every_matching_filter() {
        let router = SubscriptionRouter::default();
        let mut exact = router.add("door/command");
        let mut wildcard = router.add("door/#");
        let mut other = router.add("window/command");

        let delivered = router.dispatch(&InboundMessage::new("door/command", "open"));

        assert_eq!(delivered, 2);
        assert_eq!(exact.try_recv().unwrap().payload, b"open");
        assert_eq!(wildcard.try_recv().unwrap().payload, b"open");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn should_replace_existing_route_for_same_filter() {
        let router = SubscriptionRouter::default();
        let _first = router.add("door/command");
        let _second = router.add("door/command");

        assert_eq!(router.filters(), vec!["door/command".to_string()]);
    }

    #[test]
    fn should_keep_every_message_for_a_slow_subscriber() {
        let router = SubscriptionRouter::default();
        let mut rx = router.add("door/command");

        let accepted: usize = (0..100)
            .map(|n| router.dispatch(&InboundMessage::new("door/command", n.to_string())))
            .sum();

        let mut received = Vec::new();
        while let Ok(message) = rx.try_recv() {
            received.push(message.payload_str().map(str::to_string));
        }
        assert_eq!(accepted, 100);
        assert_eq!(received.len(), 100);
        assert_eq!(received[0].as_deref(), Some("0"));
        assert_eq!(received[99].as_deref(), Some("99"));
    }

    #[test]
    fn should_not_deliver_system_topics_to_leading_wildcard() {
        let router = SubscriptionRouter::default();
        let mut all = router.add("#");

        assert_eq!(router.dispatch(&InboundMessage::new("$SYS/uptime", "1")), 0);
        assert!(all.try_recv().is_err());
    }

    #[test]
    fn should_prune_closed_routes() {
        let router = SubscriptionRouter::default();
        let rx = router.add("door/command");
        drop(rx);

        assert_eq!(router.dispatch(&InboundMessage::new("door/command", "open")), 0);
        assert!(router.filters().is_empty());
    }

    #[test]
    fn should_remove_route() {
        let router = SubscriptionRouter::default();
        let _rx = router.add("door/command");
        router.remove("door/command");
        assert!(router.filters().is_empty());
    }

    #[test]
    fn should_agree_with_domain_topic_rules() {
        let pairs = [
            ("door/command", "door/command"),
            ("door/+", "door/command"),
            ("door/+", "door"),
            ("door/#", "door"),
            ("door/#", "door/front/command"),
            ("+/command", "$SYS/command"),
            ("#", "$SYS/uptime"),
        ];
        for (filter, topic) in pairs {
            assert_eq!(
                rumqttc::matches(topic, filter),
                hamqtt_domain::topic::matches(filter, topic),
                "{filter} vs {topic}"
            );
        }
        for filter in ["door/#", "+/state", "door/#/command", "door+", ""] {
            assert_eq!(
                rumqttc::valid_filter(filter),
                hamqtt_domain::topic::is_valid_filter(filter),
                "{filter}"
            );
        }
    }
}
