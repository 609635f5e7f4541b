// Wake-word gated, fuzzy-matched voice command dispatch

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::fuzzy::{best_match, normalize};
use crate::catalog::Destination;
use crate::config::{MAX_COMMAND_WORDS, UTTERANCE_DEBOUNCE};

/// Fixed command vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandWord {
    Stop,
    Resume,
    Help,
    Confirm,
    Cancel,
}

impl CommandWord {
    pub const ALL: [CommandWord; 5] = [
        CommandWord::Stop,
        CommandWord::Resume,
        CommandWord::Help,
        CommandWord::Confirm,
        CommandWord::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandWord::Stop => "stop",
            CommandWord::Resume => "resume",
            CommandWord::Help => "help",
            CommandWord::Confirm => "confirm",
            CommandWord::Cancel => "cancel",
        }
    }

    pub fn intent(&self) -> CommandIntent {
        match self {
            CommandWord::Stop => CommandIntent::Stop,
            CommandWord::Resume => CommandIntent::Resume,
            CommandWord::Help => CommandIntent::Help,
            CommandWord::Confirm => CommandIntent::Confirm,
            CommandWord::Cancel => CommandIntent::Cancel,
        }
    }
}

/// Canonical operator intent, from voice or the touch panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandIntent {
    Stop,
    Resume,
    Help,
    /// Destination by catalog name
    GoTo { name: String },
    Confirm,
    Cancel,
}

/// What became of one utterance
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Intent(CommandIntent),
    /// No wake word, empty, or too long: dropped without notice
    Ignored,
    /// "go to" query with no destination above threshold
    DestinationNotFound(String),
    /// Command with no vocabulary word above threshold
    Unrecognized(String),
}

/// Words following the wake phrase, or `None` when the utterance does not start with it.
/// Both arguments must be normalized; the phrase may span several words.
fn strip_wake_word<'a>(normalized: &'a str, wake_word: &str) -> Option<Vec<&'a str>> {
    let mut phrase = wake_word.split(' ').filter(|w| !w.is_empty()).peekable();
    phrase.peek()?;
    let mut words = normalized.split(' ').filter(|w| !w.is_empty());
    for expected in phrase {
        if words.next()? != expected {
            return None;
        }
    }
    Some(words.collect())
}

/// Match one utterance against the vocabulary and destination list.
/// `destinations` must already exclude disabled entries.
pub fn dispatch(
    utterance: &str,
    wake_word: &str,
    vocabulary: &[CommandWord],
    destinations: &[Destination],
    threshold: f64,
) -> Dispatch {
    let normalized = normalize(utterance);
    let Some(words) = strip_wake_word(&normalized, &normalize(wake_word)) else {
        return Dispatch::Ignored;
    };
    if words.is_empty() || words.len() > MAX_COMMAND_WORDS {
        debug!("Dropping utterance with {} command words", words.len());
        return Dispatch::Ignored;
    }

    if words.len() >= 2 && words[0] == "go" && words[1] == "to" {
        let query = words[2..].join(" ");
        if query.is_empty() {
            return Dispatch::DestinationNotFound(query);
        }
        // Either label may be spoken; the better score wins
        let candidates = destinations
            .iter()
            .flat_map(|d| [(d.display_name.as_str(), d), (d.name.as_str(), d)]);
        return match best_match(&query, candidates, threshold) {
            Some((destination, score)) => {
                debug!("'{}' matched {} ({:.2})", query, destination.name, score.similarity);
                Dispatch::Intent(CommandIntent::GoTo {
                    name: destination.name.clone(),
                })
            }
            None => Dispatch::DestinationNotFound(query),
        };
    }

    let command = words.join(" ");
    let candidates = vocabulary.iter().map(|w| (w.as_str(), *w));
    match best_match(&command, candidates, threshold) {
        Some((word, _)) => Dispatch::Intent(word.intent()),
        None => Dispatch::Unrecognized(command),
    }
}

/// Recognizer output, either a partial hypothesis or a final result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(default = "final_by_default")]
    pub is_final: bool,
}

fn final_by_default() -> bool {
    true
}

/// Voice front-end: holds at most the current partial utterance.
pub struct CommandDispatcher {
    wake_word: String,
    threshold: f64,
    buffer: Option<(String, Instant)>,
}

impl CommandDispatcher {
    pub fn new(wake_word: &str, threshold: f64) -> Self {
        Self {
            wake_word: normalize(wake_word),
            threshold,
            buffer: None,
        }
    }

    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    /// Feed one recognizer result. Partial results are only buffered; final
    /// results are matched and always leave the buffer empty.
    pub fn on_utterance(
        &mut self,
        utterance: &Utterance,
        destinations: &[Destination],
        now: Instant,
    ) -> Option<Dispatch> {
        if !utterance.is_final {
            if strip_wake_word(&normalize(&utterance.text), &self.wake_word).is_some() {
                // Replace, never accumulate; restarts the debounce
                self.buffer = Some((utterance.text.clone(), now));
            }
            return None;
        }

        self.clear();
        let outcome = dispatch(
            &utterance.text,
            &self.wake_word,
            &CommandWord::ALL,
            destinations,
            self.threshold,
        );
        match &outcome {
            Dispatch::Intent(intent) => info!("Voice command: {:?}", intent),
            Dispatch::DestinationNotFound(query) => warn!("Location \"{}\" not found", query),
            Dispatch::Unrecognized(command) => warn!("Unrecognized command \"{}\"", command),
            Dispatch::Ignored => {}
        }
        Some(outcome)
    }

    /// Drop a partial utterance that was never finalized
    pub fn expire_stale(&mut self, now: Instant) -> bool {
        let stale = matches!(
            &self.buffer,
            Some((_, at)) if now.duration_since(*at) >= UTTERANCE_DEBOUNCE
        );
        if stale {
            debug!("Clearing stale partial utterance");
            self.buffer = None;
        }
        stale
    }

    pub fn clear(&mut self) {
        self.buffer = None;
    }

    pub fn pending(&self) -> Option<&str> {
        self.buffer.as_ref().map(|(text, _)| text.as_str())
    }
}
