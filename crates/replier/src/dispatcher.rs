//! Per-request reply queue drained under a minimum inter-attempt interval.
//!
//! Enqueueing never blocks: the first message into an idle queue spawns a
//! single drain task, which delivers the head, pops it once the attempt
//! completes, and sleeps whenever the throttle window has not yet elapsed.
//! The task exits as soon as the queue is empty.

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {
    tokio::{sync::Notify, time::Instant},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use chatrelay_metrics::{counter, histogram, labels, replier as replier_metrics};

use crate::{
    error::{Error, Result},
    message::{ImageSource, OutboundMessage},
    transport::{DeadLetterSink, ReplyTransport},
};

/// Minimum spacing between the starts of two delivery attempts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Where a dispatcher is in its drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Queue empty, no drain task running.
    Idle,
    /// Drain task scheduled or about to evaluate the head.
    ReadyToSend,
    /// Waiting for the throttle window to elapse.
    Throttled,
    /// A delivery attempt for the head is in flight.
    Delivering,
    /// Shut down; enqueues are rejected.
    Closed,
}

/// Tunables for a [`ReplyDispatcher`].
#[derive(Clone)]
pub struct DispatcherOptions {
    pub min_interval: Duration,
    pub dead_letters: Option<Arc<dyn DeadLetterSink>>,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            min_interval: MIN_INTERVAL,
            dead_letters: None,
        }
    }
}

struct State {
    queue: VecDeque<OutboundMessage>,
    last_attempt: Option<Instant>,
    phase: DispatcherState,
}

struct Shared {
    transport: Arc<dyn ReplyTransport>,
    options: DispatcherOptions,
    state: Mutex<State>,
    cancel: CancellationToken,
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

enum Step {
    Wait(Duration),
    Deliver(OutboundMessage),
}

/// Outbound reply queue bound to one room.
///
/// Clones share the same queue and throttle state.
#[derive(Clone)]
pub struct ReplyDispatcher {
    shared: Arc<Shared>,
    default_room: String,
}

impl ReplyDispatcher {
    pub fn new(transport: Arc<dyn ReplyTransport>, default_room: impl Into<String>) -> Self {
        Self::with_options(transport, default_room, DispatcherOptions::default())
    }

    pub fn with_options(
        transport: Arc<dyn ReplyTransport>,
        default_room: impl Into<String>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                options,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    last_attempt: None,
                    phase: DispatcherState::Idle,
                }),
                cancel: CancellationToken::new(),
                idle: Notify::new(),
            }),
            default_room: default_room.into(),
        }
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    /// Queue a text reply to the default room.
    pub fn enqueue_text(&self, text: impl Into<String>) -> Result<()> {
        self.push(OutboundMessage::text(self.default_room.clone(), text))
    }

    /// Queue a text reply to `room`.
    pub fn enqueue_text_to(&self, room: impl Into<String>, text: impl Into<String>) -> Result<()> {
        self.push(OutboundMessage::text(room, text))
    }

    /// Queue an image reply to the default room.
    ///
    /// Decoding or PNG encoding failures are returned here and leave the
    /// queue untouched.
    pub fn enqueue_image(&self, source: impl Into<ImageSource>) -> Result<()> {
        self.enqueue_image_to(self.default_room.clone(), source)
    }

    pub fn enqueue_image_to(
        &self,
        room: impl Into<String>,
        source: impl Into<ImageSource>,
    ) -> Result<()> {
        let message = OutboundMessage::image(room, source.into()).inspect_err(|e| {
            warn!(error = %e, "dropping image reply");
            #[cfg(feature = "metrics")]
            counter!(replier_metrics::ENCODING_ERRORS_TOTAL).increment(1);
        })?;
        self.push(message)
    }

    /// Queue the image stored at `path` to the default room.
    pub fn enqueue_image_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.enqueue_image(ImageSource::File(path.into()))
    }

    /// Number of messages not yet popped, including one in flight.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn state(&self) -> DispatcherState {
        self.shared.lock().phase
    }

    /// Wait until the queue has drained or the dispatcher is closed.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if matches!(
                self.state(),
                DispatcherState::Idle | DispatcherState::Closed
            ) {
                return;
            }
            notified.await;
        }
    }

    /// Stop draining and drop everything still queued. Returns how many
    /// messages were abandoned. Later enqueues fail with [`Error::Closed`].
    pub fn shutdown(&self) -> usize {
        let abandoned = {
            let mut state = self.shared.lock();
            if state.phase == DispatcherState::Closed {
                return 0;
            }
            state.phase = DispatcherState::Closed;
            let abandoned = state.queue.len();
            state.queue.clear();
            abandoned
        };
        self.shared.cancel.cancel();
        self.shared.idle.notify_waiters();

        if abandoned > 0 {
            info!(room = %self.default_room, abandoned, "reply dispatcher shut down with pending messages");
            #[cfg(feature = "metrics")]
            counter!(replier_metrics::ABANDONED_TOTAL).increment(abandoned as u64);
        }
        abandoned
    }

    fn push(&self, message: OutboundMessage) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Message(format!("reply dispatcher needs a tokio runtime: {e}")))?;

        #[cfg(feature = "metrics")]
        let kind = message.kind;

        let spawn = {
            let mut state = self.shared.lock();
            if state.phase == DispatcherState::Closed {
                return Err(Error::Closed);
            }
            state.queue.push_back(message);
            let spawn = state.phase == DispatcherState::Idle;
            if spawn {
                state.phase = DispatcherState::ReadyToSend;
            }
            spawn
        };

        #[cfg(feature = "metrics")]
        counter!(replier_metrics::ENQUEUED_TOTAL, labels::KIND => kind.as_str()).increment(1);

        if spawn {
            runtime.spawn(drain(Arc::clone(&self.shared)));
        }
        Ok(())
    }
}

async fn drain(shared: Arc<Shared>) {
    loop {
        let step = {
            let mut state = shared.lock();
            if state.phase == DispatcherState::Closed {
                return;
            }
            let Some(head) = state.queue.front().cloned() else {
                state.phase = DispatcherState::Idle;
                drop(state);
                shared.idle.notify_waiters();
                return;
            };

            let now = Instant::now();
            match state.last_attempt.map(|at| now.duration_since(at)) {
                Some(elapsed) if elapsed < shared.options.min_interval => {
                    state.phase = DispatcherState::Throttled;
                    Step::Wait(shared.options.min_interval - elapsed)
                },
                _ => {
                    state.phase = DispatcherState::Delivering;
                    state.last_attempt = Some(now);
                    Step::Deliver(head)
                },
            }
        };

        match step {
            Step::Wait(remaining) => {
                #[cfg(feature = "metrics")]
                counter!(replier_metrics::THROTTLED_TOTAL).increment(1);
                tokio::select! {
                    () = shared.cancel.cancelled() => return,
                    () = tokio::time::sleep(remaining) => {},
                }
            },
            Step::Deliver(message) => {
                let started = Instant::now();
                let result = tokio::select! {
                    () = shared.cancel.cancelled() => return,
                    result = shared.transport.deliver(&message) => result,
                };

                #[cfg(feature = "metrics")]
                {
                    let success = if result.is_ok() { "true" } else { "false" };
                    counter!(
                        replier_metrics::DELIVERIES_TOTAL,
                        labels::KIND => message.kind.as_str(),
                        labels::SUCCESS => success
                    )
                    .increment(1);
                    histogram!(replier_metrics::DELIVERY_DURATION_SECONDS)
                        .record(started.elapsed().as_secs_f64());
                }

                {
                    let mut state = shared.lock();
                    if state.phase == DispatcherState::Closed {
                        return;
                    }
                    state.queue.pop_front();
                    state.phase = DispatcherState::ReadyToSend;
                }

                match result {
                    Ok(()) => debug!(
                        room = %message.room,
                        kind = %message.kind,
                        elapsed_ms = started.elapsed().as_millis(),
                        "reply sent"
                    ),
                    Err(e) => {
                        warn!(room = %message.room, kind = %message.kind, error = %e, "reply delivery failed");
                        if let Some(sink) = &shared.options.dead_letters {
                            sink.dead_letter(message, &e);
                        }
                    },
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, async_trait::async_trait};

    #[derive(Default)]
    struct RecordingTransport {
        attempts: Mutex<Vec<(Instant, OutboundMessage)>>,
        latency: Duration,
        fail_payload: Option<&'static str>,
    }

    impl RecordingTransport {
        fn attempts(&self) -> Vec<(Instant, OutboundMessage)> {
            self.attempts.lock().unwrap().clone()
        }

        fn payloads(&self) -> Vec<String> {
            self.attempts()
                .into_iter()
                .map(|(_, m)| m.payload)
                .collect()
        }
    }

    #[async_trait]
    impl ReplyTransport for RecordingTransport {
        async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
            self.attempts
                .lock()
                .unwrap()
                .push((Instant::now(), message.clone()));
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail_payload == Some(message.payload.as_str()) {
                return Err(Error::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        failed: Mutex<Vec<String>>,
    }

    impl DeadLetterSink for CollectingSink {
        fn dead_letter(&self, message: OutboundMessage, _error: &Error) {
            self.failed.lock().unwrap().push(message.payload);
        }
    }

    fn gaps(attempts: &[(Instant, OutboundMessage)]) -> Vec<Duration> {
        attempts
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_delivered_in_order_with_spacing() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        let start = Instant::now();
        for i in 0..5 {
            dispatcher.enqueue_text(format!("m{i}")).unwrap();
        }
        dispatcher.wait_idle().await;

        assert_eq!(transport.payloads(), ["m0", "m1", "m2", "m3", "m4"]);
        let attempts = transport.attempts();
        assert_eq!(attempts[0].0, start);
        for gap in gaps(&attempts) {
            assert!(gap >= MIN_INTERVAL, "gap {gap:?} below throttle window");
        }
        let total = attempts[4].0.duration_since(start);
        assert!(total >= MIN_INTERVAL * 4 && total < MIN_INTERVAL * 5, "{total:?}");
        assert!(attempts.iter().all(|(_, m)| m.room == "room-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_while_draining_does_not_trigger_extra_attempt() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        dispatcher.enqueue_text("first").unwrap();
        tokio::task::yield_now().await;
        assert_eq!(transport.attempts().len(), 1);

        dispatcher.enqueue_text("second").unwrap();
        dispatcher.enqueue_text("third").unwrap();
        tokio::task::yield_now().await;
        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(dispatcher.state(), DispatcherState::Throttled);

        dispatcher.wait_idle().await;
        assert_eq!(transport.payloads(), ["first", "second", "third"]);
        assert!(gaps(&transport.attempts()).iter().all(|g| *g >= MIN_INTERVAL));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_delivery_counts_toward_the_window() {
        let transport = Arc::new(RecordingTransport {
            latency: Duration::from_millis(250),
            ..Default::default()
        });
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        dispatcher.enqueue_text("a").unwrap();
        dispatcher.enqueue_text("b").unwrap();
        dispatcher.wait_idle().await;

        let gaps = gaps(&transport.attempts());
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0] >= Duration::from_millis(250) && gaps[0] < Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_dispatcher_sends_after_window_without_waiting_again() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        dispatcher.enqueue_text("a").unwrap();
        dispatcher.wait_idle().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let resumed = Instant::now();
        dispatcher.enqueue_text("b").unwrap();
        dispatcher.wait_idle().await;
        assert_eq!(transport.attempts()[1].0, resumed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_is_popped_and_dead_lettered() {
        let transport = Arc::new(RecordingTransport {
            fail_payload: Some("bad"),
            ..Default::default()
        });
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = ReplyDispatcher::with_options(
            transport.clone(),
            "room-1",
            DispatcherOptions {
                dead_letters: Some(sink.clone()),
                ..Default::default()
            },
        );

        dispatcher.enqueue_text("ok-1").unwrap();
        dispatcher.enqueue_text("bad").unwrap();
        dispatcher.enqueue_text("ok-2").unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(transport.payloads(), ["ok-1", "bad", "ok-2"]);
        assert_eq!(*sink.failed.lock().unwrap(), ["bad"]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_image_leaves_queue_unchanged() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        dispatcher.enqueue_text("before").unwrap();
        assert_eq!(dispatcher.pending(), 1);

        let err = dispatcher
            .enqueue_image(b"not an image".to_vec())
            .unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
        assert_eq!(dispatcher.pending(), 1);

        dispatcher.wait_idle().await;
        assert_eq!(transport.payloads(), ["before"]);
    }

    #[tokio::test(start_paused = true)]
    async fn image_file_is_sent_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.png");
        std::fs::write(&path, crate::message::tests::tiny_png()).unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");
        dispatcher.enqueue_image_file(&path).unwrap();
        dispatcher.wait_idle().await;

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].1.kind, chatrelay_protocol::ReplyKind::Image);
        assert!(!attempts[0].1.payload.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_image_file_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        let err = dispatcher
            .enqueue_image_file(dir.path().join("gone.png"))
            .unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
        assert_eq!(dispatcher.pending(), 0);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_pending_and_rejects_new_messages() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReplyDispatcher::new(transport.clone(), "room-1");

        dispatcher.enqueue_text("a").unwrap();
        dispatcher.enqueue_text("b").unwrap();
        dispatcher.enqueue_text("c").unwrap();
        tokio::task::yield_now().await;
        assert_eq!(transport.attempts().len(), 1);

        // "a" is already popped; "b" and "c" are still queued.
        assert_eq!(dispatcher.shutdown(), 2);
        assert_eq!(dispatcher.state(), DispatcherState::Closed);
        assert!(matches!(dispatcher.enqueue_text("d"), Err(Error::Closed)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.payloads(), ["a"]);
        dispatcher.wait_idle().await;
    }

    #[test]
    fn enqueue_outside_runtime_is_an_error() {
        let dispatcher = ReplyDispatcher::new(Arc::new(RecordingTransport::default()), "room-1");
        assert!(matches!(
            dispatcher.enqueue_text("x"),
            Err(Error::Message(_))
        ));
        assert_eq!(dispatcher.pending(), 0);
    }
}
