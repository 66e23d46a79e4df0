//! Single-use parse sessions.
//!
//! A [`ParseSession`] turns the callbacks of an [`EventSource`] into one
//! awaited result. The source reports through an [`EventSink`] from whatever
//! thread it likes, and a timer races the source's terminal event. Both sides
//! go through the same mutex, and whichever reaches the pending result first
//! settles it. Every later attempt is discarded.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use euroref_common::{CurrencyCode, CurrencyPair, SessionId};

use crate::error::{ParseError, ParseResult, SourceError};
use crate::source::{EventSource, StartElement};

/// Attribute holding the three-letter currency code.
pub const CURRENCY_ATTRIBUTE: &str = "currency";

/// Attribute holding the rate against the euro.
pub const RATE_ATTRIBUTE: &str = "rate";

/// How a session was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The document ended and the pairs were returned.
    Success,
    /// The source reported a malformed document.
    ParseError,
    /// The timer fired first.
    Timeout,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, `parse` not called yet.
    Idle,
    /// Source started and timer armed.
    Running,
    /// Result delivered. Terminal.
    Resolved(Outcome),
}

type Pending = oneshot::Sender<ParseResult<Vec<CurrencyPair>>>;

struct SessionState {
    phase: SessionPhase,
    pairs: Vec<CurrencyPair>,
    pending: Option<Pending>,
    timer: Option<JoinHandle<()>>,
    discarded_events: usize,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            pairs: vec![CurrencyPair::euro()],
            pending: None,
            timer: None,
            discarded_events: 0,
        }
    }

    /// Settle the pending result. Returns false if it was already settled.
    fn resolve(&mut self, result: Result<(), ParseError>) -> bool {
        let Some(pending) = self.pending.take() else {
            self.discarded_events += 1;
            return false;
        };

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let result = match result {
            Ok(()) => {
                self.phase = SessionPhase::Resolved(Outcome::Success);
                Ok(mem::take(&mut self.pairs))
            }
            Err(e) => {
                self.phase = SessionPhase::Resolved(match e {
                    ParseError::Timeout => Outcome::Timeout,
                    ParseError::Parsing(_) => Outcome::ParseError,
                });
                self.pairs.clear();
                Err(e)
            }
        };

        if pending.send(result).is_err() {
            debug!("Caller stopped waiting before the session resolved");
        }
        true
    }
}

/// Receiving end for an event source's callbacks.
///
/// Cheap to clone; every clone feeds the same session.
#[derive(Clone)]
pub struct EventSink {
    id: SessionId,
    state: Arc<Mutex<SessionState>>,
}

impl EventSink {
    /// Get the session this sink reports to.
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Check whether the session has already been settled.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state.lock().phase, SessionPhase::Resolved(_))
    }

    /// Report a started element. Elements without a recognized currency and
    /// a rate are skipped.
    pub fn element_started(&self, element: StartElement) {
        let pair = currency_pair(&element);

        let mut state = self.state.lock();
        if state.phase != SessionPhase::Running {
            state.discarded_events += 1;
            debug!(session_id = %self.id, element = %element.name, "Discarding late element");
            return;
        }

        match pair {
            Some(pair) => {
                trace!(session_id = %self.id, code = %pair.code(), rate = pair.rate(), "Accepted pair");
                state.pairs.push(pair);
            }
            None => {
                debug!(session_id = %self.id, element = %element.name, "Skipping element");
            }
        }
    }

    /// Report the end of the document.
    pub fn document_ended(&self) {
        let mut state = self.state.lock();
        let count = state.pairs.len();
        if state.resolve(Ok(())) {
            info!(session_id = %self.id, pairs = count, "Parsed currency pairs");
        } else {
            debug!(session_id = %self.id, "Ignoring document end after resolution");
        }
    }

    /// Report a malformed document.
    pub fn parse_failed(&self, error: SourceError) {
        let mut state = self.state.lock();
        let detail = error.to_string();
        if state.resolve(Err(ParseError::Parsing(error))) {
            warn!(session_id = %self.id, error = %detail, "Document rejected by tokenizer");
        } else {
            debug!(session_id = %self.id, error = %detail, "Ignoring parse error after resolution");
        }
    }

    fn expire(&self) {
        let mut state = self.state.lock();
        // The timer is the running task; nothing left to cancel.
        state.timer = None;
        if state.resolve(Err(ParseError::Timeout)) {
            warn!(session_id = %self.id, "Parse timed out");
        }
    }

    fn arm_timer(&self, timeout: Duration) {
        let mut state = self.state.lock();
        if state.pending.is_none() {
            debug!(session_id = %self.id, "Resolved before the timer was armed");
            return;
        }

        let sink = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            sink.expire();
        }));
    }
}

fn currency_pair(element: &StartElement) -> Option<CurrencyPair> {
    let code: CurrencyCode = element.attribute(CURRENCY_ATTRIBUTE)?.parse().ok()?;
    let rate = element.attribute(RATE_ATTRIBUTE)?;
    Some(CurrencyPair::new(code, rate))
}

/// One parse of one document, resolved exactly once.
pub struct ParseSession {
    id: SessionId,
    source: Box<dyn EventSource>,
    state: Arc<Mutex<SessionState>>,
}

impl ParseSession {
    /// Create an idle session over the given source.
    pub fn new(source: impl EventSource) -> Self {
        Self {
            id: SessionId::new(),
            source: Box::new(source),
            state: Arc::new(Mutex::new(SessionState::new())),
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    /// Run the source against a timer and wait for the first outcome.
    ///
    /// On success the list starts with the euro at `1.00`, followed by every
    /// recognized element in document order.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn parse(self, timeout: Duration) -> ParseResult<Vec<CurrencyPair>> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.pending = Some(tx);
            state.phase = SessionPhase::Running;
        }

        let sink = EventSink {
            id: self.id,
            state: self.state,
        };

        let source = self.source;
        let worker = sink.clone();
        tokio::task::spawn_blocking(move || source.start(worker));

        sink.arm_timer(timeout);

        match rx.await {
            Ok(result) => result,
            Err(_) => {
                // Only reachable when the runtime tears down the timer task.
                warn!(session_id = %sink.id, "Session dropped without a result");
                Err(ParseError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::init_tracing;
    use proptest::prelude::*;
    use std::thread;
    use tokio_test::{assert_err, assert_ok};

    /// Delivers a fixed script of calls on the calling thread.
    enum Step {
        Element(StartElement),
        End,
        Fail(SourceError),
    }

    struct ScriptedSource(Vec<Step>);

    impl EventSource for ScriptedSource {
        fn start(self: Box<Self>, sink: EventSink) {
            for step in self.0 {
                match step {
                    Step::Element(element) => sink.element_started(element),
                    Step::End => sink.document_ended(),
                    Step::Fail(error) => sink.parse_failed(error),
                }
            }
        }
    }

    /// Never reports anything.
    struct SilentSource;

    impl EventSource for SilentSource {
        fn start(self: Box<Self>, _sink: EventSink) {}
    }

    /// Ends the document from a separate thread after a delay.
    struct DelayedSource(Duration);

    impl EventSource for DelayedSource {
        fn start(self: Box<Self>, sink: EventSink) {
            thread::spawn(move || {
                thread::sleep(self.0);
                sink.element_started(cube("USD", "1.08"));
                sink.document_ended();
            });
        }
    }

    fn cube(code: &str, rate: &str) -> StartElement {
        StartElement::new("Cube")
            .with_attribute(CURRENCY_ATTRIBUTE, code)
            .with_attribute(RATE_ATTRIBUTE, rate)
    }

    fn session(steps: Vec<Step>) -> (ParseSession, Arc<Mutex<SessionState>>) {
        init_tracing();
        let session = ParseSession::new(ScriptedSource(steps));
        let state = session.state.clone();
        (session, state)
    }

    #[tokio::test]
    async fn test_idle_until_parse() {
        let (session, state) = session(vec![Step::End]);
        assert_eq!(session.phase(), SessionPhase::Idle);

        assert_ok!(session.parse(Duration::from_secs(5)).await);
        assert_eq!(state.lock().phase, SessionPhase::Resolved(Outcome::Success));
    }

    #[tokio::test]
    async fn test_timer_not_armed_after_early_resolution() {
        init_tracing();
        let (tx, rx) = oneshot::channel();
        let mut state = SessionState::new();
        state.pending = Some(tx);
        state.phase = SessionPhase::Running;
        let sink = EventSink {
            id: SessionId::new(),
            state: Arc::new(Mutex::new(state)),
        };

        sink.element_started(cube("USD", "1.08"));
        sink.document_ended();
        sink.arm_timer(Duration::from_millis(1));

        assert!(sink.state.lock().timer.is_none());
        let pairs = assert_ok!(assert_ok!(rx.await));
        assert_eq!(pairs.len(), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let state = sink.state.lock();
        assert_eq!(state.phase, SessionPhase::Resolved(Outcome::Success));
        assert_eq!(state.discarded_events, 0);
    }

    #[tokio::test]
    async fn test_euro_leads_document_order() {
        let (session, _) = session(vec![
            Step::Element(StartElement::new("Envelope")),
            Step::Element(cube("USD", "1.0813")),
            Step::Element(cube("JPY", "162.51")),
            Step::Element(cube("CHF", "0.9421")),
            Step::End,
        ]);

        let pairs = assert_ok!(session.parse(Duration::from_secs(5)).await);
        assert_eq!(
            pairs,
            vec![
                CurrencyPair::euro(),
                CurrencyPair::new(CurrencyCode::UsDollar, "1.0813"),
                CurrencyPair::new(CurrencyCode::JapaneseYen, "162.51"),
                CurrencyPair::new(CurrencyCode::SwissFranc, "0.9421"),
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_unrecognized_and_incomplete_elements() {
        let (session, _) = session(vec![
            Step::Element(cube("XXX", "1.00")),
            Step::Element(StartElement::new("Cube").with_attribute(CURRENCY_ATTRIBUTE, "USD")),
            Step::Element(StartElement::new("Cube").with_attribute(RATE_ATTRIBUTE, "1.08")),
            Step::Element(cube("usd", "1.08")),
            Step::Element(cube("GBP", "0.8571")),
            Step::End,
        ]);

        let pairs = assert_ok!(session.parse(Duration::from_secs(5)).await);
        assert_eq!(
            pairs,
            vec![
                CurrencyPair::euro(),
                CurrencyPair::new(CurrencyCode::PoundSterling, "0.8571"),
            ]
        );
    }

    #[tokio::test]
    async fn test_success_cancels_timer() {
        let (session, state) = session(vec![Step::Element(cube("USD", "1.08")), Step::End]);

        assert_ok!(session.parse(Duration::from_millis(100)).await);
        tokio::time::sleep(Duration::from_millis(250)).await;

        let state = state.lock();
        assert_eq!(state.phase, SessionPhase::Resolved(Outcome::Success));
        assert_eq!(state.discarded_events, 0);
        assert!(state.timer.is_none());
        assert!(state.pending.is_none());
    }

    #[tokio::test]
    async fn test_silent_source_times_out() {
        init_tracing();
        let session = ParseSession::new(SilentSource);

        let err = assert_err!(session.parse(Duration::from_millis(1)).await);
        assert_eq!(err, ParseError::Timeout);
    }

    #[tokio::test]
    async fn test_timeout_discards_partial_pairs() {
        let (session, state) = session(vec![
            Step::Element(cube("USD", "1.08")),
            Step::Element(cube("JPY", "162.51")),
        ]);

        let err = assert_err!(session.parse(Duration::from_millis(5)).await);
        assert!(err.is_timeout());

        let state = state.lock();
        assert_eq!(state.phase, SessionPhase::Resolved(Outcome::Timeout));
        assert!(state.pairs.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_carries_detail() {
        let detail = SourceError::new("unexpected end of file", 14);
        let (session, state) = session(vec![
            Step::Element(cube("USD", "1.08")),
            Step::Fail(detail.clone()),
        ]);

        let err = assert_err!(session.parse(Duration::from_secs(5)).await);
        assert_eq!(err, ParseError::Parsing(detail));
        assert_eq!(state.lock().phase, SessionPhase::Resolved(Outcome::ParseError));
    }

    #[tokio::test]
    async fn test_late_events_after_success_are_discarded() {
        let (session, state) = session(vec![
            Step::Element(cube("USD", "1.08")),
            Step::End,
            Step::Element(cube("JPY", "162.51")),
            Step::Fail(SourceError::new("trailing garbage", 99)),
            Step::End,
        ]);

        let pairs = assert_ok!(session.parse(Duration::from_secs(5)).await);
        assert_eq!(pairs.len(), 2);

        // The source runs on a blocking worker; wait for it to finish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = state.lock();
        assert_eq!(state.discarded_events, 3);
        assert_eq!(state.phase, SessionPhase::Resolved(Outcome::Success));
    }

    #[tokio::test]
    async fn test_late_document_end_after_timeout_is_discarded() {
        init_tracing();
        let session = ParseSession::new(DelayedSource(Duration::from_millis(40)));
        let state = session.state.clone();

        let err = assert_err!(session.parse(Duration::from_millis(5)).await);
        assert!(err.is_timeout());

        tokio::time::sleep(Duration::from_millis(120)).await;
        let state = state.lock();
        assert_eq!(state.phase, SessionPhase::Resolved(Outcome::Timeout));
        assert_eq!(state.discarded_events, 2);
        assert!(state.pairs.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_terminal_events_resolve_once() {
        struct RacingSource;

        impl EventSource for RacingSource {
            fn start(self: Box<Self>, sink: EventSink) {
                let handles: Vec<_> = (0..8)
                    .map(|i| {
                        let sink = sink.clone();
                        thread::spawn(move || {
                            sink.element_started(cube("USD", "1.08"));
                            if i % 2 == 0 {
                                sink.document_ended();
                            } else {
                                sink.parse_failed(SourceError::new("racing", i));
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            }
        }

        init_tracing();
        let session = ParseSession::new(RacingSource);
        let state = session.state.clone();

        let result = session.parse(Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = state.lock();
        let outcome = match state.phase {
            SessionPhase::Resolved(outcome) => outcome,
            other => panic!("session not resolved: {other:?}"),
        };
        match (&result, outcome) {
            (Ok(_), Outcome::Success) => {}
            (Err(ParseError::Parsing(_)), Outcome::ParseError) => {}
            (Err(ParseError::Timeout), Outcome::Timeout) => {}
            other => panic!("result and phase disagree: {other:?}"),
        }
        // Eight terminal calls plus possibly the timer; exactly one of them won.
        assert!(state.discarded_events >= 7);
        assert!(state.pending.is_none());
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_break_resolution() {
        init_tracing();
        let session = ParseSession::new(DelayedSource(Duration::from_millis(30)));
        let state = session.state.clone();

        let outer = tokio::time::timeout(
            Duration::from_millis(5),
            session.parse(Duration::from_secs(10)),
        )
        .await;
        assert!(outer.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = state.lock();
        assert_eq!(state.phase, SessionPhase::Resolved(Outcome::Success));
        assert!(state.timer.is_none());
        assert_eq!(state.discarded_events, 0);
    }

    proptest! {
        #[test]
        fn prop_recognized_elements_follow_euro_in_order(
            picks in proptest::collection::vec((0..CurrencyCode::ALL.len(), 1u32..100_000, any::<bool>()), 0..40)
        ) {
            let mut steps = Vec::new();
            let mut expected = vec![CurrencyPair::euro()];
            for (index, rate, recognized) in picks {
                let rate = format!("{}.{:04}", rate / 10_000, rate % 10_000);
                if recognized {
                    let code = CurrencyCode::ALL[index];
                    steps.push(Step::Element(cube(code.as_str(), &rate)));
                    expected.push(CurrencyPair::new(code, rate));
                } else {
                    steps.push(Step::Element(cube("ZZZ", &rate)));
                }
            }
            steps.push(Step::End);

            let session = ParseSession::new(ScriptedSource(steps));
            let pairs = tokio_test::block_on(session.parse(Duration::from_secs(5)));
            prop_assert_eq!(pairs, Ok(expected));
        }
    }
}
