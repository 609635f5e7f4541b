// Voice command pipeline
//
// Provides:
// - Edit-distance similarity scoring
// - Wake-word gating, word-count guard and fuzzy dispatch to operator intents

pub mod dispatcher;
pub mod fuzzy;

pub use dispatcher::{dispatch, CommandDispatcher, CommandIntent, CommandWord, Dispatch, Utterance};
