use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One quiz item. Accepted answers are matched case-insensitively after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub correct_answers: Vec<String>,
    pub multiple_choice_options: Vec<String>,
    pub textual_hint: String,
}

impl Question {
    pub fn accepts(&self, answer: &str) -> bool {
        let normalized = normalize_answer(answer);
        self.correct_answers
            .iter()
            .any(|correct| correct.trim().to_lowercase() == normalized)
    }
}

pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Ordered, read-only list of questions for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self> {
        if questions.is_empty() {
            bail!("Question bank must contain at least one question");
        }
        for question in &questions {
            if question.correct_answers.iter().all(|a| a.trim().is_empty()) {
                bail!("Question {} has no accepted answers", question.id);
            }
        }
        Ok(Self { questions })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question bank {}", path.display()))?;
        let questions: Vec<Question> =
            serde_json::from_str(&raw).context("Failed to parse question bank JSON")?;
        Self::new(questions)
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self {
            questions: builtin_questions(),
        }
    }
}

fn question(id: u32, text: &str, answers: &[&str], options: [&str; 3], hint: &str) -> Question {
    Question {
        id,
        text: text.to_string(),
        correct_answers: answers.iter().map(|a| a.to_string()).collect(),
        multiple_choice_options: options.iter().map(|o| o.to_string()).collect(),
        textual_hint: hint.to_string(),
    }
}

fn builtin_questions() -> Vec<Question> {
    vec![
        question(
            0,
            "Test question. Type the word READY to prove you are awake.",
            &["ready"],
            ["Ready", "Not ready", "Maybe"],
            "Hint: It starts with R and ends with Y",
        ),
        question(
            1,
            "In crypto, what is the general name for the place where you store your coins and tokens?",
            &["wallet", "crypto wallet", "cryptowallet"],
            ["Wallet", "Server", "Safe"],
            "Reminder: Think about what you use to store physical money",
        ),
        question(
            2,
            "In gaming, what is the common phrase for when your character becomes stronger and moves to the next stage of power?",
            &["level up", "levelup", "leveling up", "levelled up", "leveling", "level-up"],
            ["Level up", "Pause menu", "Game over"],
            "Reminder: this word is used in gaming when your character becomes stronger",
        ),
        question(
            3,
            "What is the everyday word for the part of a car that you use to slow down and stop?",
            &["brakes", "brake"],
            ["Brakes", "Transmission", "Headlights"],
            "Hint: You press a pedal to activate this component",
        ),
        question(
            4,
            "I get bigger the more you take away from me. What am I?",
            &["hole", "a hole"],
            ["A hole", "A tire", "A bag"],
            "Reminder: Think about digging in the ground",
        ),
        question(
            5,
            "In the anime Naruto, what is the name of the ninja village that Naruto is from?",
            &["hidden leaf", "leaf village", "konohagakure", "the hidden leaf village", "konoha"],
            ["Hidden Leaf", "Hidden Sand", "Hidden Mist"],
            "Hint: It's related to a part of a tree",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_bank_has_six_questions_with_three_options() {
        let bank = QuestionBank::default();
        assert_eq!(bank.len(), 6);
        assert!(bank.iter().all(|q| q.multiple_choice_options.len() == 3));
    }

    #[test]
    fn accepts_is_case_and_whitespace_insensitive() {
        let bank = QuestionBank::default();
        let first = bank.get(0).unwrap();
        assert!(first.accepts("  ReAdY  "));
        assert!(!first.accepts("read"));
        assert!(!first.accepts("ready!"));
    }

    #[test]
    fn rejects_empty_bank() {
        assert!(QuestionBank::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_question_without_answers() {
        let mut q = QuestionBank::default().get(0).unwrap().clone();
        q.correct_answers = vec!["  ".to_string()];
        assert!(QuestionBank::new(vec![q]).is_err());
    }

    #[test]
    fn parses_camel_case_json() {
        let raw = r#"[{"id":7,"text":"2+2?","correctAnswers":["4","four"],"multipleChoiceOptions":["4","5"],"textualHint":"even"}]"#;
        let questions: Vec<Question> = serde_json::from_str(raw).unwrap();
        let bank = QuestionBank::new(questions).unwrap();
        assert!(bank.get(0).unwrap().accepts("FOUR"));
    }
}
