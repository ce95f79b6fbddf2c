#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use dialogue_grounding_rs::dataset::{ActionLabel, DialogueExample};
use dialogue_grounding_rs::error::GeneratorError;
use dialogue_grounding_rs::generator::TextGenerator;

/// What the fake service does for one call
pub enum Reply {
    /// Answer every numbered prompt line with "N. do <line>"
    Echo,
    Fail,
    Text(&'static str),
}

/// In-process stand-in for the annotation/summarization service.
/// Follows its script, then echoes.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Echo);
        match reply {
            Reply::Echo => Ok(echo(prompt)),
            Reply::Fail => Err(GeneratorError::Network("connection reset".to_string())),
            Reply::Text(text) => Ok(text.to_string()),
        }
    }
}

fn echo(prompt: &str) -> String {
    let answers: Vec<String> = prompt
        .lines()
        .filter_map(|line| {
            let (number, rest) = line.split_once(". ")?;
            number.parse::<usize>().ok()?;
            Some(format!("{number}. do {rest}"))
        })
        .collect();
    if answers.is_empty() {
        "A short summary.".to_string()
    } else {
        answers.join("\n")
    }
}

/// Example whose gold response is `response`, action unset
pub fn example(response: &str) -> DialogueExample {
    DialogueExample::new(
        "Outlaws from the West",
        "<Dutch van der Linde> We ride. </Dutch van der Linde>",
        "Dutch van der Linde",
        "We ride.",
        "Arthur Morgan",
        response,
    )
    .with_action(ActionLabel::Unset)
}

pub fn examples(count: usize) -> Vec<DialogueExample> {
    (0..count).map(|i| example(&format!("r{i}"))).collect()
}
