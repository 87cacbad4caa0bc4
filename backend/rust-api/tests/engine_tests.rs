use std::sync::Arc;

use birthday_challenge_api::game::{GameEngine, TickOutcome};
use birthday_challenge_api::models::{
    GameConfig, GiftType, Outcome, Question, QuestionBank, RewardChoice, Screen, SessionCommand,
    SessionState,
};

fn config() -> GameConfig {
    GameConfig {
        starting_balance: 100,
        starting_time: 40,
        wrong_answer_penalty: 10,
        timeout_penalty: 10,
        hint_cost: 3,
        ..GameConfig::default()
    }
}

fn started(config: GameConfig) -> GameEngine {
    let mut engine = GameEngine::new(config, Arc::new(QuestionBank::default()));
    engine.start(config);
    engine
}

#[test]
fn wrong_answer_then_advance() {
    let mut engine = started(config());

    engine.set_pending_answer("definitely not");
    assert!(engine.submit_answer());
    assert_eq!(engine.state().balance, 90);
    assert_eq!(engine.state().last_outcome, Outcome::Incorrect);

    assert!(engine.advance_question());
    let state = engine.state();
    assert_eq!(state.question_index, 1);
    assert_eq!(state.time_remaining, 40);
    assert_eq!(state.hints_used, 0);
}

#[test]
fn two_hints_then_no_more() {
    let mut engine = started(config());

    assert!(engine.request_hint());
    assert_eq!(engine.state().revealed_options.len(), 3);
    assert_eq!(engine.state().balance, 97);

    assert!(engine.request_hint());
    assert_eq!(engine.state().revealed_options, vec!["Ready", "Not ready"]);
    assert_eq!(engine.state().balance, 94);

    assert!(!engine.request_hint());
    assert_eq!(engine.state().balance, 94);
    assert_eq!(engine.state().hints_used, 2);
}

#[test]
fn forty_ticks_time_out_once() {
    let mut engine = started(config());

    for _ in 0..39 {
        assert_eq!(engine.tick(), TickOutcome::Counting);
    }
    assert_eq!(engine.tick(), TickOutcome::TimedOut);
    assert_eq!(engine.state().time_remaining, 0);
    assert_eq!(engine.state().balance, 90);
    assert_eq!(engine.state().last_outcome, Outcome::Incorrect);

    assert_eq!(engine.tick(), TickOutcome::Ignored);
    assert_eq!(engine.state().balance, 90);
}

#[test]
fn messy_casing_and_whitespace_still_correct() {
    let mut engine = started(config());

    engine.set_pending_answer("  ReAdY  ");
    assert!(engine.submit_answer());
    assert_eq!(engine.state().last_outcome, Outcome::Correct);
    assert_eq!(engine.state().balance, 100);
}

#[test]
fn summary_reflects_balance_at_last_resolution() {
    let mut engine = started(config());
    let count = engine.question_count();

    for index in 0..count {
        engine.set_pending_answer(if index % 2 == 0 { "wrong" } else { "" });
        if !engine.submit_answer() {
            while engine.tick() != TickOutcome::TimedOut {}
        }
        assert!(engine.advance_question());
    }
    assert_eq!(engine.state().screen, Screen::Finished);

    let summary = engine
        .build_summary(RewardChoice {
            kind: GiftType::Gas,
            contact: "dave@example.com".to_string(),
            note: Some("  ".to_string()),
        })
        .unwrap();
    assert_eq!(summary.final_balance, 100 - 10 * count as u32);
    assert_eq!(summary.note, None);
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Tick,
    Hint,
    Boost,
    EasyHint,
    AnswerRight,
    AnswerWrong,
    Submit,
    Advance,
}

const STEPS: [Step; 8] = [
    Step::Tick,
    Step::Hint,
    Step::Boost,
    Step::EasyHint,
    Step::AnswerRight,
    Step::AnswerWrong,
    Step::Submit,
    Step::Advance,
];

fn run(engine: &mut GameEngine, step: Step) {
    match step {
        Step::Tick => {
            engine.tick();
        }
        Step::Hint => {
            engine.apply(&SessionCommand::RequestHint);
        }
        Step::Boost => {
            engine.apply(&SessionCommand::RequestTimeBoost);
        }
        Step::EasyHint => {
            engine.apply(&SessionCommand::RequestEasyHint);
        }
        Step::AnswerRight => {
            engine.apply(&SessionCommand::SetPendingAnswer {
                text: "yes".to_string(),
            });
        }
        Step::AnswerWrong => {
            engine.apply(&SessionCommand::SetPendingAnswer {
                text: "no".to_string(),
            });
        }
        Step::Submit => {
            engine.apply(&SessionCommand::SubmitAnswer);
        }
        Step::Advance => {
            engine.apply(&SessionCommand::AdvanceQuestion);
        }
    }
}

fn check_transition(before: &SessionState, after: &SessionState, cfg: &GameConfig, step: Step) {
    let context = format!("{:?}: {:?} -> {:?}", step, before, after);

    assert!(after.balance <= before.balance, "balance rose: {}", context);
    assert!(after.question_index >= before.question_index, "went back: {}", context);
    assert!(after.hints_used <= 2, "too many hints: {}", context);

    if before.screen == Screen::Finished {
        assert_eq!(before, after, "finished state changed: {}", context);
        return;
    }

    let spent = before.balance - after.balance;
    if after.question_index == before.question_index {
        assert!(after.hints_used >= before.hints_used, "hints dropped: {}", context);
        if after.hints_used == before.hints_used + 1 {
            assert_eq!(spent, cfg.hint_cost.min(before.balance), "{}", context);
        }
        if after.time_boost_used && !before.time_boost_used {
            assert_eq!(spent, cfg.time_boost_cost.min(before.balance), "{}", context);
        }
        if after.easy_hint_used && !before.easy_hint_used {
            assert_eq!(spent, cfg.easy_hint_cost.min(before.balance), "{}", context);
        }
        if before.time_boost_used {
            assert!(after.time_boost_used, "{}", context);
        }
        if before.easy_hint_used {
            assert!(after.easy_hint_used, "{}", context);
        }
        if before.last_outcome != Outcome::Unknown {
            assert_eq!(after.last_outcome, before.last_outcome, "{}", context);
        }
    } else {
        assert_eq!(spent, 0, "advancing cost balance: {}", context);
        assert_eq!(after.hints_used, 0, "{}", context);
        assert_eq!(after.time_remaining, cfg.starting_time, "{}", context);
        assert_eq!(after.last_outcome, Outcome::Unknown, "{}", context);
    }
}

fn explore(engine: &GameEngine, cfg: &GameConfig, depth: usize, finished_seen: &mut usize) {
    if depth == 0 {
        return;
    }
    for step in STEPS {
        let mut next = engine.clone();
        run(&mut next, step);
        check_transition(engine.state(), next.state(), cfg, step);
        if engine.state().screen != Screen::Finished && next.state().screen == Screen::Finished {
            *finished_seen += 1;
        }
        explore(&next, cfg, depth - 1, finished_seen);
    }
}

#[test]
fn every_short_command_sequence_keeps_invariants() {
    let cfg = GameConfig {
        starting_balance: 12,
        starting_time: 2,
        hint_cost: 3,
        easy_hint_cost: 2,
        time_boost_cost: 1,
        time_boost_seconds: 1,
        wrong_answer_penalty: 5,
        timeout_penalty: 4,
    };
    let bank = QuestionBank::new(vec![
        Question {
            id: 1,
            text: "first".to_string(),
            correct_answers: vec!["yes".to_string()],
            multiple_choice_options: vec!["yes".to_string(), "no".to_string(), "maybe".to_string()],
            textual_hint: "y".to_string(),
        },
        Question {
            id: 2,
            text: "second".to_string(),
            correct_answers: vec!["yes".to_string()],
            multiple_choice_options: vec!["no".to_string(), "maybe".to_string(), "yes".to_string()],
            textual_hint: "y".to_string(),
        },
    ])
    .unwrap();

    let mut engine = GameEngine::new(cfg, Arc::new(bank));
    engine.start(cfg);

    let mut finished_seen = 0;
    explore(&engine, &cfg, 6, &mut finished_seen);
    assert!(finished_seen > 0, "no explored sequence reached the end screen");
}
