//! Think tag processing
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`.
//! Depending on the configured [`ThinkMode`] the thought is passed through
//! untouched, surfaced as a prefix, or dropped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static THINK_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Match <think>...</think> blocks, including multiline
    Regex::new(r"(?s)<think>(.*?)</think>").expect("Invalid think tag regex")
});

/// Prefix placed in front of a surfaced thought
pub const THOUGHT_PREFIX: &str = "思考过程：";

/// How thought segments in model output are handled
///
/// Configured as an integer: `0` raw, `1` show, `2` hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ThinkMode {
    /// Leave the reply exactly as the model produced it
    #[default]
    Raw,
    /// Extract the thought and show it ahead of the answer
    Show,
    /// Extract the thought and discard it
    Hide,
}

impl TryFrom<u8> for ThinkMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ThinkMode::Raw),
            1 => Ok(ThinkMode::Show),
            2 => Ok(ThinkMode::Hide),
            other => Err(format!("think mode must be 0, 1 or 2, got {}", other)),
        }
    }
}

impl From<ThinkMode> for u8 {
    fn from(mode: ThinkMode) -> Self {
        match mode {
            ThinkMode::Raw => 0,
            ThinkMode::Show => 1,
            ThinkMode::Hide => 2,
        }
    }
}

/// Split a raw model reply into `(thought_prefix, result)`
///
/// The prefix is empty unless the mode is [`ThinkMode::Show`] and the reply
/// actually carried a thought. Joining both halves gives the text shown to
/// the user; only `result` is meant to be persisted.
pub fn process_thoughts(raw: &str, mode: ThinkMode) -> (String, String) {
    if mode == ThinkMode::Raw {
        return (String::new(), raw.to_string());
    }

    let (thought, result) = split_thought(raw);

    match mode {
        ThinkMode::Show if !thought.is_empty() => {
            (format!("{}{}\n\n", THOUGHT_PREFIX, thought), result)
        }
        _ => (String::new(), result),
    }
}

fn split_thought(raw: &str) -> (String, String) {
    let captured: Vec<&str> = THINK_TAG_REGEX
        .captures_iter(raw)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if !captured.is_empty() {
        let result = THINK_TAG_REGEX.replace_all(raw, "").trim().to_string();
        return (flatten(&captured.join("\n")), result);
    }

    // Some templates open the think block in the prompt, so only the closing tag arrives
    if let Some((thought, result)) = raw.split_once("</think>") {
        return (flatten(thought), result.trim().to_string());
    }

    (String::new(), raw.trim().to_string())
}

/// Collapse a multi-line thought onto one line
fn flatten(thought: &str) -> String {
    thought
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
