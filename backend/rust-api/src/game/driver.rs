use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::engine::{EngineError, GameEngine, TickOutcome};
use super::scheduler::{Scheduler, TaskHandle};
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, HINTS_PURCHASED_TOTAL};
use crate::models::{
    timer::{
        AnswerResolved, QuestionAdvanced, SessionEvent, SessionFinished, SessionStarted,
        TimeExpired, TimerTick,
    },
    Outcome, RewardChoice, Screen, SessionCommand, SessionSummary, SessionView,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTiming {
    pub tick_interval: Duration,
    /// Pause between a resolved question and the next one.
    pub advance_delay: Duration,
}

impl Default for DriverTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            advance_delay: Duration::from_millis(2500),
        }
    }
}

/// Pending timers plus a generation per timer kind. A callback that was
/// already running when its handle was dropped sees a newer generation and
/// does nothing.
#[derive(Default)]
struct Timers {
    ticker: Option<TaskHandle>,
    advance: Option<TaskHandle>,
    ticker_generation: u64,
    advance_generation: u64,
}

impl Timers {
    fn disarm_ticker(&mut self) {
        self.ticker = None;
        self.ticker_generation += 1;
    }

    fn disarm_advance(&mut self) {
        self.advance = None;
        self.advance_generation += 1;
    }

    fn clear(&mut self) {
        self.disarm_ticker();
        self.disarm_advance();
    }
}

struct DriverInner {
    id: String,
    engine: Mutex<GameEngine>,
    timers: Mutex<Timers>,
    scheduler: Arc<dyn Scheduler>,
    timing: DriverTiming,
    events: broadcast::Sender<SessionEvent>,
    last_active: Mutex<Instant>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one play-through: feeds the engine with ticks and delayed advances
/// and publishes what happened. Scheduled callbacks only hold a weak
/// reference, and every pending timer is cancelled on drop.
pub struct SessionDriver {
    inner: Arc<DriverInner>,
}

impl SessionDriver {
    pub fn new(
        id: impl Into<String>,
        engine: GameEngine,
        scheduler: Arc<dyn Scheduler>,
        timing: DriverTiming,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DriverInner {
                id: id.into(),
                engine: Mutex::new(engine),
                timers: Mutex::new(Timers::default()),
                scheduler,
                timing,
                events,
                last_active: Mutex::new(Instant::now()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.touch();
        self.inner.events.subscribe()
    }

    pub fn start(&self) -> SessionView {
        self.inner.start();
        self.view()
    }

    pub fn apply(&self, command: &SessionCommand) -> SessionView {
        match command {
            SessionCommand::Start => self.inner.start(),
            SessionCommand::AdvanceQuestion => {
                self.inner.advance(None);
            }
            other => self.inner.apply(other),
        }
        self.view()
    }

    pub fn view(&self) -> SessionView {
        self.touch();
        let engine = lock(&self.inner.engine);
        SessionView {
            session_id: self.inner.id.clone(),
            question_count: engine.question_count(),
            question: engine.question_view(),
            state: engine.state().clone(),
        }
    }

    pub fn screen(&self) -> Screen {
        lock(&self.inner.engine).state().screen
    }

    /// Time since a client last looked at or drove this session. Timer
    /// callbacks do not count.
    pub fn idle_for(&self) -> Duration {
        lock(&self.inner.last_active).elapsed()
    }

    fn touch(&self) {
        *lock(&self.inner.last_active) = Instant::now();
    }

    pub fn build_summary(&self, choice: RewardChoice) -> Result<SessionSummary, EngineError> {
        lock(&self.inner.engine).build_summary(choice)
    }

    pub fn shutdown(&self) {
        lock(&self.inner.timers).clear();
        tracing::debug!("Session {} timers cancelled", self.inner.id);
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DriverInner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn start(self: &Arc<Self>) {
        let mut engine = lock(&self.engine);
        engine.restart();

        let mut timers = lock(&self.timers);
        timers.disarm_advance();
        self.arm_ticker(&mut timers);

        let state = engine.state();
        tracing::info!(
            "Session {} started: balance={}, time={}s",
            self.id,
            state.balance,
            state.time_remaining
        );
        self.emit(SessionEvent::SessionStarted(SessionStarted {
            session_id: self.id.clone(),
            balance: state.balance,
            time_remaining: state.time_remaining,
            timestamp: Utc::now(),
        }));
    }

    fn apply(self: &Arc<Self>, command: &SessionCommand) {
        let mut engine = lock(&self.engine);
        let was_resolved = engine.state().is_resolved();
        let applied = engine.apply(command);

        tracing::debug!(
            "Session {} command={} applied={}",
            self.id,
            command.name(),
            applied
        );
        if !applied {
            return;
        }

        match command {
            SessionCommand::RequestHint => {
                let tier = if engine.state().hints_used == 1 {
                    "options"
                } else {
                    "fifty_fifty"
                };
                HINTS_PURCHASED_TOTAL.with_label_values(&[tier]).inc();
            }
            SessionCommand::RequestTimeBoost => {
                HINTS_PURCHASED_TOTAL.with_label_values(&["time_boost"]).inc();
            }
            SessionCommand::RequestEasyHint => {
                HINTS_PURCHASED_TOTAL.with_label_values(&["textual"]).inc();
            }
            _ => {}
        }

        if was_resolved || !engine.state().is_resolved() {
            return;
        }

        let state = engine.state();
        let correct = state.last_outcome == Outcome::Correct;
        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if correct { "true" } else { "false" }])
            .inc();
        tracing::info!(
            "Session {} question {} answered: outcome={:?}, balance={}",
            self.id,
            state.question_index,
            state.last_outcome,
            state.balance
        );

        self.emit(SessionEvent::AnswerResolved(AnswerResolved {
            session_id: self.id.clone(),
            question_index: state.question_index,
            outcome: state.last_outcome,
            balance: state.balance,
            message: state.last_message.clone(),
            timestamp: Utc::now(),
        }));

        let mut timers = lock(&self.timers);
        timers.disarm_ticker();
        self.schedule_advance(&mut timers);
    }

    fn on_tick(self: &Arc<Self>, generation: u64) {
        let mut engine = lock(&self.engine);
        if lock(&self.timers).ticker_generation != generation {
            return;
        }
        let outcome = engine.tick();
        let state = engine.state();

        match outcome {
            TickOutcome::Ignored => {
                lock(&self.timers).disarm_ticker();
            }
            TickOutcome::Counting => {
                self.emit(SessionEvent::TimerTick(TimerTick {
                    session_id: self.id.clone(),
                    question_index: state.question_index,
                    remaining_seconds: state.time_remaining,
                    timestamp: Utc::now(),
                }));
            }
            TickOutcome::TimedOut => {
                tracing::info!(
                    "Session {} question {} timed out, balance={}",
                    self.id,
                    state.question_index,
                    state.balance
                );
                self.emit(SessionEvent::TimeExpired(TimeExpired {
                    session_id: self.id.clone(),
                    question_index: state.question_index,
                    balance: state.balance,
                    message: state.last_message.clone(),
                    timestamp: Utc::now(),
                }));

                let mut timers = lock(&self.timers);
                timers.disarm_ticker();
                self.schedule_advance(&mut timers);
            }
        }
    }

    /// Moves on from a resolved question, whether the delay elapsed (`due`
    /// carries the generation it was scheduled under) or the client asked to
    /// skip it. Returns whether the engine advanced.
    fn advance(self: &Arc<Self>, due: Option<u64>) -> bool {
        let mut engine = lock(&self.engine);
        if due.is_some_and(|generation| lock(&self.timers).advance_generation != generation) {
            return false;
        }
        if !engine.advance_question() {
            return false;
        }

        let mut timers = lock(&self.timers);
        timers.disarm_advance();
        let state = engine.state();

        if state.screen == Screen::Finished {
            timers.disarm_ticker();
            tracing::info!(
                "Session {} finished with balance {}",
                self.id,
                state.balance
            );
            self.emit(SessionEvent::SessionFinished(SessionFinished {
                session_id: self.id.clone(),
                final_balance: state.balance,
                timestamp: Utc::now(),
            }));
        } else {
            self.arm_ticker(&mut timers);
            self.emit(SessionEvent::QuestionAdvanced(QuestionAdvanced {
                session_id: self.id.clone(),
                question_index: state.question_index,
                time_remaining: state.time_remaining,
                timestamp: Utc::now(),
            }));
        }
        true
    }

    fn arm_ticker(self: &Arc<Self>, timers: &mut Timers) {
        timers.disarm_ticker();
        let generation = timers.ticker_generation;
        let weak = Arc::downgrade(self);
        timers.ticker = Some(self.scheduler.every(
            self.timing.tick_interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_tick(generation);
                }
            }),
        ));
    }

    fn schedule_advance(self: &Arc<Self>, timers: &mut Timers) {
        timers.disarm_advance();
        let generation = timers.advance_generation;
        let weak = Arc::downgrade(self);
        timers.advance = Some(self.scheduler.after(
            self.timing.advance_delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.advance(Some(generation));
                }
            }),
        ));
    }
}
