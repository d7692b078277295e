//! Typed publish/subscribe channel between the engine and its collaborators.
//!
//! Publishing is synchronous fan-out to all current subscribers in
//! subscription order; there is no queue and no retry, and a publish with
//! zero subscribers is a silent no-op. Handlers receive a borrowed event and
//! must not try to subscribe or unsubscribe the bus they are being invoked
//! from; the bus is owned by the context and handed out `&mut`, so the
//! borrow checker forbids it anyway.

/// Every channel the engine publishes on, as one tagged payload union.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Overall cleanup progress changed.
    ProgressChanged { cleaned: u32, total: u32 },
    /// Countdown state, published every tick while the run is live.
    TimeUpdated { remaining_seconds: f32 },
    /// Either sentimental score changed.
    ScoresChanged { balance: i32, accumulation: i32 },
    /// Remaining count dropped to or below the configured activation count.
    MissingItems { labels: Vec<String> },
    /// The run concluded, exactly once per playthrough.
    RunConcluded { won: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEventKind {
    ProgressChanged,
    TimeUpdated,
    ScoresChanged,
    MissingItems,
    RunConcluded,
}

impl GameEvent {
    pub fn kind(&self) -> GameEventKind {
        match self {
            Self::ProgressChanged { .. } => GameEventKind::ProgressChanged,
            Self::TimeUpdated { .. } => GameEventKind::TimeUpdated,
            Self::ScoresChanged { .. } => GameEventKind::ScoresChanged,
            Self::MissingItems { .. } => GameEventKind::MissingItems,
            Self::RunConcluded { .. } => GameEventKind::RunConcluded,
        }
    }
}

/// How many events have gone out per channel since the bus was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishCounts {
    pub total: u32,
    pub progress_changed: u32,
    pub time_updated: u32,
    pub scores_changed: u32,
    pub missing_items: u32,
    pub run_concluded: u32,
}

impl PublishCounts {
    fn record(&mut self, kind: GameEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            GameEventKind::ProgressChanged => {
                self.progress_changed = self.progress_changed.saturating_add(1)
            }
            GameEventKind::TimeUpdated => self.time_updated = self.time_updated.saturating_add(1),
            GameEventKind::ScoresChanged => {
                self.scores_changed = self.scores_changed.saturating_add(1)
            }
            GameEventKind::MissingItems => self.missing_items = self.missing_items.saturating_add(1),
            GameEventKind::RunConcluded => self.run_concluded = self.run_concluded.saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

type EventHandler = Box<dyn FnMut(&GameEvent)>;

struct Subscription {
    id: SubscriberId,
    /// `None` subscribes to every channel.
    channel: Option<GameEventKind>,
    handler: EventHandler,
}

#[derive(Default)]
pub struct EventBus {
    next_subscriber_id: u64,
    subscriptions: Vec<Subscription>,
    publish_counts: PublishCounts,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to one channel. Handlers fire in subscription
    /// order.
    pub fn subscribe(
        &mut self,
        channel: GameEventKind,
        handler: impl FnMut(&GameEvent) + 'static,
    ) -> SubscriberId {
        self.push_subscription(Some(channel), Box::new(handler))
    }

    /// Subscribes a handler to every channel.
    pub fn subscribe_all(&mut self, handler: impl FnMut(&GameEvent) + 'static) -> SubscriberId {
        self.push_subscription(None, Box::new(handler))
    }

    fn push_subscription(
        &mut self,
        channel: Option<GameEventKind>,
        handler: EventHandler,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber_id);
        self.next_subscriber_id = self.next_subscriber_id.saturating_add(1);
        self.subscriptions.push(Subscription {
            id,
            channel,
            handler,
        });
        id
    }

    /// Removes a subscription. Returns false if the id was already gone.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        self.subscriptions.len() != before
    }

    /// Synchronously delivers the event to every matching subscriber.
    pub fn publish(&mut self, event: &GameEvent) {
        let kind = event.kind();
        self.publish_counts.record(kind);
        for subscription in &mut self.subscriptions {
            match subscription.channel {
                Some(channel) if channel != kind => continue,
                _ => (subscription.handler)(event),
            }
        }
    }

    pub fn publish_counts(&self) -> PublishCounts {
        self.publish_counts
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<GameEvent>>>) -> impl FnMut(&GameEvent) + 'static {
        let log = Rc::clone(log);
        move |event| log.borrow_mut().push(event.clone())
    }

    fn tag_recorder(
        log: &Rc<RefCell<Vec<&'static str>>>,
        tag: &'static str,
    ) -> impl FnMut(&GameEvent) + 'static {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(tag)
    }

    #[test]
    fn publish_with_no_subscribers_is_a_no_op() {
        let mut bus = EventBus::new();
        bus.publish(&GameEvent::RunConcluded { won: true });
        assert_eq!(bus.publish_counts().run_concluded, 1);
    }

    #[test]
    fn fan_out_follows_subscription_order() {
        let mut bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe_all(tag_recorder(&log, "first"));
        bus.subscribe_all(tag_recorder(&log, "second"));
        bus.subscribe_all(tag_recorder(&log, "third"));

        bus.publish(&GameEvent::TimeUpdated {
            remaining_seconds: 1.0,
        });
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn channel_subscription_filters_other_channels() {
        let mut bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe(GameEventKind::ProgressChanged, recorder(&log));

        bus.publish(&GameEvent::TimeUpdated {
            remaining_seconds: 2.0,
        });
        bus.publish(&GameEvent::ProgressChanged {
            cleaned: 1,
            total: 5,
        });

        assert_eq!(
            *log.borrow(),
            vec![GameEvent::ProgressChanged {
                cleaned: 1,
                total: 5
            }]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery_and_reports_missing_ids() {
        let mut bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = bus.subscribe_all(recorder(&log));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.publish(&GameEvent::RunConcluded { won: false });
        assert!(log.borrow().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_counts_track_every_channel() {
        let mut bus = EventBus::new();
        bus.publish(&GameEvent::ProgressChanged {
            cleaned: 0,
            total: 0,
        });
        bus.publish(&GameEvent::ScoresChanged {
            balance: 0,
            accumulation: 0,
        });
        bus.publish(&GameEvent::MissingItems { labels: Vec::new() });

        let counts = bus.publish_counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.progress_changed, 1);
        assert_eq!(counts.scores_changed, 1);
        assert_eq!(counts.missing_items, 1);
        assert_eq!(counts.time_updated, 0);
    }
}
