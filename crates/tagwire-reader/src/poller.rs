//! Insertion/removal polling.
//!
//! The reader never reports presence or absence by itself; it only emits the
//! identifier of whatever tag is in its field. Presence is therefore
//! reconstructed by probing every [`POLL_TICK_MS`] milliseconds:
//!
//! - a non-empty identifier while waiting for insertion means a chip is
//!   present;
//! - a *different* non-empty identifier while waiting for removal means the
//!   previous chip is gone. That identifier already belongs to the next
//!   chip, so it is kept as the pending identifier and consumed by the next
//!   insertion wait without touching the wire.
//!
//! A chip stays present as long as the reader is silent or repeats the same
//! identifier.
//!
//! ```text
//!        wait_insertion            wait_removal
//! Idle ──────────────────► Present ─────────────► Idle (+ pending id)
//!   ▲        timeout          │        timeout
//!   └─────────────────────────┘◄──── stays Present
//! ```

use std::time::Duration;

use tagwire_core::constants::{POLL_TICK_MS, PROBE_COMMAND};
use tagwire_core::{Chip, ChipIdentifier, effective_card_type, normalize};

use crate::error::ReaderError;
use crate::traits::{ChipFactory, SerialLine};
use crate::types::PresenceState;

/// Emit a tracing event only when the scope is verbose.
macro_rules! poll_log {
    ($scope:expr, $level:ident, $($arg:tt)+) => {
        if $scope.is_verbose() {
            tracing::$level!($($arg)+);
        }
    };
}

/// Logging scope of one poll call.
///
/// Derived from the unit's [`LogPolicy`](crate::settings::LogPolicy) for
/// each call; nothing shared is mutated, so leaving the call by any path
/// leaves the policy as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollScope {
    verbose: bool,
}

impl PollScope {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Scope that suppresses every poll-loop log.
    pub fn quiet() -> Self {
        Self { verbose: false }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Parameters of one poll call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Deadline of the loop; zero waits forever.
    pub max_wait: Duration,

    /// Read timeout of each probe.
    pub read_timeout: Duration,

    /// Logging scope.
    pub scope: PollScope,
}

impl PollOptions {
    pub fn new(max_wait: Duration, read_timeout: Duration) -> Self {
        Self {
            max_wait,
            read_timeout,
            scope: PollScope::quiet(),
        }
    }

    pub fn with_scope(mut self, scope: PollScope) -> Self {
        self.scope = scope;
        self
    }

    fn expired(&self, elapsed: Duration) -> bool {
        !self.max_wait.is_zero() && elapsed >= self.max_wait
    }
}

/// Result of a single probe/read cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A non-empty identifier was read.
    Identifier(ChipIdentifier),

    /// The device stayed silent or sent nothing usable.
    NoData,

    /// The transport failed; treated like [`CycleOutcome::NoData`] by the
    /// poll loops.
    TransportError(ReaderError),
}

/// Send the probe and read one reply.
pub async fn probe_cycle<L: SerialLine>(line: Option<&mut L>, read_timeout: Duration) -> CycleOutcome {
    let Some(line) = line else {
        return CycleOutcome::TransportError(ReaderError::disconnected("no serial port"));
    };

    if let Err(e) = line.write(PROBE_COMMAND).await {
        return CycleOutcome::TransportError(e);
    }

    match line.read(read_timeout).await {
        Ok(raw) => {
            let identifier = normalize(&raw);
            if identifier.is_empty() {
                CycleOutcome::NoData
            } else {
                CycleOutcome::Identifier(identifier)
            }
        }
        Err(ReaderError::Timeout { .. }) => CycleOutcome::NoData,
        Err(e) => CycleOutcome::TransportError(e),
    }
}

/// Presence state machine of one reader.
#[derive(Debug)]
pub struct PresencePoller {
    state: PresenceState,
    inserted: Option<Chip>,
    pending: Option<ChipIdentifier>,
    tick: Duration,
}

impl Default for PresencePoller {
    fn default() -> Self {
        Self::new()
    }
}

impl PresencePoller {
    pub fn new() -> Self {
        Self {
            state: PresenceState::Idle,
            inserted: None,
            pending: None,
            tick: Duration::from_millis(POLL_TICK_MS),
        }
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    /// The chip currently present, if any.
    pub fn inserted_chip(&self) -> Option<&Chip> {
        self.inserted.as_ref()
    }

    /// Identifier carried over from the last removal, if any.
    pub fn pending_identifier(&self) -> Option<&ChipIdentifier> {
        self.pending.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.inserted.is_some()
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Wait until a chip is presented or the deadline expires.
    ///
    /// Returns `true` when a chip was materialized through `factory`.
    /// Transport errors never abort the loop.
    pub async fn wait_insertion<L: SerialLine, F: ChipFactory>(
        &mut self,
        mut line: Option<&mut L>,
        factory: &F,
        card_type: &str,
        options: PollOptions,
    ) -> bool {
        let scope = options.scope;
        poll_log!(scope, info, "Waiting insertion... max wait {}ms", options.max_wait.as_millis());

        self.state = PresenceState::AwaitingInsertion;
        let mut elapsed = Duration::ZERO;
        let mut inserted = false;

        loop {
            let candidate = match self.pending.take() {
                Some(identifier) => {
                    poll_log!(scope, debug, "Using identifier carried over from removal: {}", identifier);
                    Some(identifier)
                }
                None => match probe_cycle(line.as_deref_mut(), options.read_timeout).await {
                    CycleOutcome::Identifier(identifier) => Some(identifier),
                    CycleOutcome::NoData => None,
                    CycleOutcome::TransportError(e) => {
                        poll_log!(scope, trace, "No reply this cycle: {}", e);
                        None
                    }
                },
            };

            if let Some(identifier) = candidate {
                let chip = factory.create_chip(effective_card_type(card_type), identifier);
                poll_log!(scope, info, "Chip detected: {}", chip);
                self.inserted = Some(chip);
                inserted = true;
                break;
            }

            tokio::time::sleep(self.tick).await;
            elapsed += self.tick;
            if options.expired(elapsed) {
                break;
            }
        }

        self.pending = None;
        self.state = self.settled_state();

        poll_log!(
            scope,
            info,
            "Card inserted: {}, timeout expired: {}",
            inserted,
            options.expired(elapsed)
        );
        inserted
    }

    /// Wait until the present chip is replaced by another one or the deadline
    /// expires.
    ///
    /// Returns `false` immediately when nothing is present. The reader cannot
    /// see a tag leave its field, so removal is only observed as a different
    /// identifier.
    pub async fn wait_removal<L: SerialLine>(
        &mut self,
        mut line: Option<&mut L>,
        options: PollOptions,
    ) -> bool {
        let scope = options.scope;
        poll_log!(scope, info, "Waiting removal... max wait {}ms", options.max_wait.as_millis());

        self.pending = None;
        let Some(current) = self.inserted.as_ref().map(|chip| chip.identifier.clone()) else {
            poll_log!(scope, info, "No chip present, nothing to remove");
            return false;
        };

        self.state = PresenceState::AwaitingRemoval;
        let mut elapsed = Duration::ZERO;
        let mut removed = false;

        loop {
            match probe_cycle(line.as_deref_mut(), options.read_timeout).await {
                CycleOutcome::Identifier(identifier) if identifier != current => {
                    poll_log!(scope, info, "Different chip {} read, previous chip removed", identifier);
                    self.inserted = None;
                    self.pending = Some(identifier);
                    removed = true;
                    break;
                }
                CycleOutcome::Identifier(_) | CycleOutcome::NoData => {}
                CycleOutcome::TransportError(e) => {
                    poll_log!(scope, trace, "No reply this cycle: {}", e);
                }
            }

            tokio::time::sleep(self.tick).await;
            elapsed += self.tick;
            if options.expired(elapsed) {
                break;
            }
        }

        self.state = self.settled_state();

        poll_log!(
            scope,
            info,
            "Card removed: {}, timeout expired: {}",
            removed,
            options.expired(elapsed)
        );
        removed
    }

    fn settled_state(&self) -> PresenceState {
        if self.inserted.is_some() {
            PresenceState::Present
        } else {
            PresenceState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::GenericChipFactory;
    use crate::mock::{MockLineHandle, MockReply, MockSerialLine};
    use tokio::time::Instant;

    const READ: Duration = Duration::from_millis(500);

    fn options(max_wait_ms: u64) -> PollOptions {
        PollOptions::new(Duration::from_millis(max_wait_ms), READ)
    }

    async fn open_line() -> (MockSerialLine, MockLineHandle) {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        line.open().await.unwrap();
        (line, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_insertion_detected_immediately() {
        let (mut line, handle) = open_line().await;
        handle.push_reply(MockReply::ascii("255"));
        let mut poller = PresencePoller::new();

        let start = Instant::now();
        let inserted = poller
            .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(2000))
            .await;

        assert!(inserted);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(poller.state(), PresenceState::Present);
        let chip = poller.inserted_chip().unwrap();
        assert_eq!(chip.identifier.to_hex(), "0000000000ff");
        assert_eq!(chip.card_type, "GenericTag");
    }

    #[tokio::test(start_paused = true)]
    async fn test_insertion_timeout_is_one_tick() {
        let (mut line, handle) = open_line().await;
        let mut poller = PresencePoller::new();

        let start = Instant::now();
        let inserted = poller
            .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(500))
            .await;

        assert!(!inserted);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(handle.probe_count(), 1);
        assert_eq!(poller.state(), PresenceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insertion_deadline_rounds_up_to_ticks() {
        let (mut line, handle) = open_line().await;
        let mut poller = PresencePoller::new();

        let start = Instant::now();
        poller
            .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(600))
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert_eq!(handle.probe_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_do_not_abort_insertion() {
        let (mut line, handle) = open_line().await;
        handle.push_replies([
            MockReply::Error("framing".into()),
            MockReply::Empty,
            MockReply::Silence,
            MockReply::ascii("42"),
        ]);
        let mut poller = PresencePoller::new();

        let start = Instant::now();
        let inserted = poller
            .wait_insertion(Some(&mut line), &GenericChipFactory, "EM4102", options(5000))
            .await;

        assert!(inserted);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert_eq!(poller.inserted_chip().unwrap().card_type, "EM4102");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_line_times_out() {
        let mut poller = PresencePoller::new();
        let inserted = poller
            .wait_insertion::<MockSerialLine, _>(None, &GenericChipFactory, "UNKNOWN", options(1000))
            .await;
        assert!(!inserted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wait_is_unbounded() {
        let (mut line, handle) = open_line().await;
        handle.push_replies(std::iter::repeat_n(MockReply::Silence, 40));
        handle.push_reply(MockReply::ascii("7"));
        let mut poller = PresencePoller::new();

        let start = Instant::now();
        let inserted = poller
            .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(0))
            .await;

        assert!(inserted);
        assert_eq!(start.elapsed(), Duration::from_millis(40 * 500));
        assert_eq!(handle.probe_count(), 41);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_without_chip_returns_immediately() {
        let (mut line, handle) = open_line().await;
        let mut poller = PresencePoller::new();

        let start = Instant::now();
        assert!(!poller.wait_removal(Some(&mut line), options(0)).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(handle.probe_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_identifier_keeps_chip_present() {
        let (mut line, handle) = open_line().await;
        handle.push_reply(MockReply::ascii("100"));
        handle.set_idle_reply(MockReply::ascii("100"));
        let mut poller = PresencePoller::new();
        poller
            .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(500))
            .await;

        let removed = poller.wait_removal(Some(&mut line), options(1500)).await;

        assert!(!removed);
        assert!(poller.is_present());
        assert_eq!(poller.state(), PresenceState::Present);
        assert_eq!(poller.pending_identifier(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_by_replacement_carries_identifier_over() {
        let (mut line, handle) = open_line().await;
        handle.push_replies([
            MockReply::ascii("100"),
            MockReply::ascii("100"),
            MockReply::Silence,
            MockReply::ascii("200"),
        ]);
        let mut poller = PresencePoller::new();

        assert!(
            poller
                .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(500))
                .await
        );
        assert!(poller.wait_removal(Some(&mut line), options(5000)).await);
        assert_eq!(poller.state(), PresenceState::Idle);
        assert_eq!(poller.pending_identifier(), Some(&normalize(b"200")));

        let probes = handle.probe_count();
        assert!(
            poller
                .wait_insertion(Some(&mut line), &GenericChipFactory, "UNKNOWN", options(500))
                .await
        );
        assert_eq!(handle.probe_count(), probes);
        assert_eq!(poller.inserted_chip().unwrap().identifier, normalize(b"200"));
        assert_eq!(poller.pending_identifier(), None);
    }

    #[tokio::test]
    async fn test_probe_cycle_outcomes() {
        let (mut line, handle) = open_line().await;
        handle.push_replies([
            MockReply::ascii("5"),
            MockReply::Empty,
            MockReply::Silence,
            MockReply::Error("overrun".into()),
        ]);

        assert!(matches!(
            probe_cycle(Some(&mut line), READ).await,
            CycleOutcome::Identifier(_)
        ));
        assert!(matches!(probe_cycle(Some(&mut line), READ).await, CycleOutcome::NoData));
        assert!(matches!(probe_cycle(Some(&mut line), READ).await, CycleOutcome::NoData));
        assert!(matches!(
            probe_cycle(Some(&mut line), READ).await,
            CycleOutcome::TransportError(ReaderError::Communication { .. })
        ));
        assert_eq!(handle.written().len(), 4);
    }

    #[test]
    fn test_poll_scope() {
        assert!(!PollScope::quiet().is_verbose());
        assert!(PollScope::new(true).is_verbose());
        assert_eq!(options(0).scope, PollScope::quiet());
    }
}
