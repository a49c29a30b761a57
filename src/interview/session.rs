//! # Interview Session
//!
//! The running transcript of the one interview in progress: a fixed persona
//! turn followed by candidate/interviewer pairs. The session is a plain value.
//! Whoever owns it (the HTTP layer keeps it in `AppState`) is responsible for
//! making sure only one turn touches it at a time.
//!
//! ## Invariants:
//! - `turns()[0]` is always the persona turn
//! - After the persona, speakers strictly alternate Candidate, Interviewer
//! - `len()` is therefore always odd: `2 * exchanges + 1`

use crate::config::InterviewConfig;
use serde::Serialize;

/// Persona the interviewer is primed with at the start of every interview.
pub const DEFAULT_PERSONA: &str = "You are an AI interviewer called Katy. You are interviewing a candidate for a software engineering position. Keep your responses to no more than 2-3 sentences.";

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// System prompt describing the interviewer
    Persona,
    Candidate,
    Interviewer,
}

/// One utterance in the session. Fields are private so appended turns stay immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
}

impl Turn {
    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// How the session is flattened into a single completion prompt.
#[derive(Debug, Clone)]
pub struct PromptFormat {
    pub candidate_label: String,
    pub interviewer_label: String,
    /// Most recent completed exchanges included in a prompt (0 = all of them)
    pub max_history_exchanges: usize,
}

impl Default for PromptFormat {
    fn default() -> Self {
        Self {
            candidate_label: "Candidate".to_string(),
            interviewer_label: "Katy".to_string(),
            max_history_exchanges: 20,
        }
    }
}

/// The conversation so far.
#[derive(Debug, Clone)]
pub struct Session {
    persona: String,
    format: PromptFormat,
    turns: Vec<Turn>,
}

impl Session {
    /// Create a session holding only the persona turn.
    pub fn new(persona: impl Into<String>, format: PromptFormat) -> Self {
        let persona = persona.into();
        Self {
            turns: vec![Turn {
                speaker: Speaker::Persona,
                text: persona.clone(),
            }],
            persona,
            format,
        }
    }

    /// Build a session from the `[interview]` configuration section.
    pub fn from_config(config: &InterviewConfig) -> Self {
        Self::new(
            config.persona.clone(),
            PromptFormat {
                candidate_label: config.candidate_label.clone(),
                interviewer_label: config.interviewer_label.clone(),
                max_history_exchanges: config.max_history_exchanges,
            },
        )
    }

    /// Drop every exchange and go back to the persona turn alone.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Number of completed candidate/interviewer pairs.
    pub fn exchange_count(&self) -> usize {
        (self.turns.len() - 1) / 2
    }

    /// Append one candidate turn and the interviewer's reply to it.
    ///
    /// Both turns go in together so the alternation invariant can never be
    /// broken by a failure between the two appends.
    pub fn record_exchange(&mut self, candidate_text: impl Into<String>, reply_text: impl Into<String>) {
        self.turns.push(Turn {
            speaker: Speaker::Candidate,
            text: candidate_text.into(),
        });
        self.turns.push(Turn {
            speaker: Speaker::Interviewer,
            text: reply_text.into(),
        });
    }

    /// Flatten the session plus a not-yet-recorded candidate utterance into one prompt.
    ///
    /// ## Layout:
    /// ```text
    /// <persona>
    /// Candidate: <text>
    /// Katy: <reply>
    /// ...
    /// Candidate: <pending>
    /// Katy:
    /// ```
    /// The trailing interviewer label is left open for the model to complete.
    /// Only the last `max_history_exchanges` exchanges are included.
    pub fn render_prompt(&self, pending_candidate: &str) -> String {
        let exchanges = &self.turns[1..];
        let limit = self.format.max_history_exchanges;
        let skip = if limit == 0 {
            0
        } else {
            exchanges.len().saturating_sub(limit.saturating_mul(2))
        };

        let mut prompt = self.persona.clone();
        for turn in &exchanges[skip..] {
            match turn.speaker() {
                Speaker::Candidate => prompt.push_str(&self.candidate_marker(turn.text())),
                Speaker::Interviewer => prompt.push_str(turn.text()),
                Speaker::Persona => {}
            }
        }
        prompt.push_str(&self.candidate_marker(pending_candidate));
        prompt
    }

    fn candidate_marker(&self, candidate_text: &str) -> String {
        format!(
            "\n{}: {} \n{}: ",
            self.format.candidate_label, candidate_text, self.format.interviewer_label
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA, PromptFormat::default())
    }
}
