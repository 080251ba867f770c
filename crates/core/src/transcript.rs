//! Transcript parsing and normalization.
//!
//! Session transcripts arrive either as raw text (`"Usuario: hola\n..."`)
//! or as an ordered list of speaker-tagged turns. Both forms normalize to
//! the same canonical rendering the grading prompts expect, plus a user
//! turn count used for the insufficient-content gate.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum user turns for a session to be worth a workflow-runner
/// submission. Shorter sessions may still be graded directly or closed out
/// with a zero score.
pub const MIN_USER_TURNS: usize = 8;

/// Canonical speaker label rendered for user turns.
pub const USER_LABEL: &str = "Usuario";
/// Canonical speaker label rendered for AI turns.
pub const AI_LABEL: &str = "Agente";

/// Raw-transcript speaker labels recognized as the user (compared
/// case-insensitively). Anything else is treated as the AI side.
const USER_LABELS: &[&str] = &["usuario", "user"];

// ---------------------------------------------------------------------------
// Turn model
// ---------------------------------------------------------------------------

/// Which side of the conversation produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

/// One conversational turn of a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl TranscriptTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: None,
        }
    }
}

/// A transcript normalized for grading.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTranscript {
    /// Canonical `Usuario:` / `Agente:` rendering of the conversation.
    pub text: String,
    /// The parsed turns backing [`text`](Self::text).
    pub turns: Vec<TranscriptTurn>,
    /// Number of user turns, the insufficient-content signal.
    pub user_turn_count: usize,
}

impl NormalizedTranscript {
    /// Whether the session carries enough user speech to justify an
    /// external-workflow submission.
    pub fn is_sufficient(&self) -> bool {
        self.user_turn_count >= MIN_USER_TURNS
    }
}

// ---------------------------------------------------------------------------
// Raw-text parsing
// ---------------------------------------------------------------------------

/// Parse raw transcript text into speaker-tagged turns.
///
/// - A line shaped `Speaker: text` (first colon splits, both sides
///   trimmed, both non-empty) starts a new turn.
/// - Any other non-blank line continues the previous turn's text; with no
///   previous turn it is dropped.
/// - When no turn is recognized at all, the whole raw input becomes a
///   single user turn so short or free-form sessions still grade.
pub fn parse_raw_transcript(raw: &str) -> Vec<TranscriptTurn> {
    let mut turns: Vec<TranscriptTurn> = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match split_turn_line(line) {
            Some((label, text)) => {
                turns.push(TranscriptTurn::new(classify_label(label), text));
            }
            None => {
                if let Some(last) = turns.last_mut() {
                    last.text.push(' ');
                    last.text.push_str(line.trim());
                }
            }
        }
    }

    if turns.is_empty() {
        return vec![TranscriptTurn::new(Speaker::User, raw)];
    }
    turns
}

/// Split a `Speaker: text` line at its first colon.
///
/// Returns `None` when either side is empty after trimming, which makes
/// the line a continuation of the previous turn.
fn split_turn_line(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.split_once(':')?;
    let label = label.trim();
    let text = rest.trim();
    if label.is_empty() || text.is_empty() {
        return None;
    }
    Some((label, text))
}

fn classify_label(label: &str) -> Speaker {
    if USER_LABELS.iter().any(|u| label.eq_ignore_ascii_case(u)) {
        Speaker::User
    } else {
        Speaker::Ai
    }
}

/// Whether raw text contains at least one recognizable `Speaker: text`
/// line. When it does not, [`parse_raw_transcript`] falls back to a single
/// whole-input user turn; callers use this to log that fallback.
pub fn has_recognizable_turns(raw: &str) -> bool {
    raw.lines().any(|line| split_turn_line(line).is_some())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize raw transcript text.
pub fn normalize_raw(raw: &str) -> NormalizedTranscript {
    normalize_turns(parse_raw_transcript(raw))
}

/// Normalize an ordered list of speaker-tagged turns.
pub fn normalize_turns(turns: Vec<TranscriptTurn>) -> NormalizedTranscript {
    let user_turn_count = turns.iter().filter(|t| t.speaker == Speaker::User).count();
    let text = turns
        .iter()
        .map(|t| {
            let label = match t.speaker {
                Speaker::User => USER_LABEL,
                Speaker::Ai => AI_LABEL,
            };
            format!("{label}: {}", t.text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    NormalizedTranscript {
        text,
        turns,
        user_turn_count,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
