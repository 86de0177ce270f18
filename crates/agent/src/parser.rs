//! Response parser: raw backend text to a structured decision.
//!
//! Expected shape (labels are case-insensitive and must start a line):
//!
//! ```text
//! Thought: <reasoning>
//! Action: <tool name>
//! Action Input: <literal text or {"key": "value"}>
//! ```
//!
//! or
//!
//! ```text
//! Thought: <reasoning>
//! Final Answer: <answer>
//! ```
//!
//! A `Final Answer` label wins over any action in the same reply.

use std::sync::LazyLock;

use regex_lite::Regex;
use stepwise_core::ActionInput;

static LABELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:\*\*)?(thought|action[ \t]*input|action|final[ \t]*answer|observation)(?:\*\*)?[ \t]*:(?:\*\*)?",
    )
    .expect("label pattern is valid")
});

/// What the backend decided to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Dispatch `tool` with `input`.
    Act { tool: String, input: ActionInput },
    /// Stop with a terminal answer.
    Finish { answer: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub thought: String,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Action Input was given without an Action")]
    MissingAction,

    #[error("Action '{action}' was given without an Action Input")]
    MissingActionInput { action: String },

    #[error("No action was specified. Please provide an action or a final answer.")]
    NoActionOrAnswer,

    #[error("Action Input looks like a JSON object but could not be parsed: {reason}")]
    InvalidStructuredInput { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
    Observation,
}

impl Label {
    fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let compact: String = name.split_whitespace().collect();
        match compact.as_str() {
            "thought" => Label::Thought,
            "actioninput" => Label::ActionInput,
            "action" => Label::Action,
            "finalanswer" => Label::FinalAnswer,
            _ => Label::Observation,
        }
    }
}

/// A labelled field: its label and the byte range of its content.
struct Field {
    label: Label,
    start: usize,
    content_start: usize,
    end: usize,
}

fn fields(text: &str) -> Vec<Field> {
    let mut found: Vec<Field> = LABELS
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some(Field {
                label: Label::from_name(name.as_str()),
                start: whole.start(),
                content_start: whole.end(),
                end: text.len(),
            })
        })
        .collect();

    for i in 1..found.len() {
        found[i - 1].end = found[i].start;
    }
    found
}

fn first<'a>(fields: &'a [Field], label: Label) -> Option<&'a Field> {
    fields.iter().find(|f| f.label == label)
}

/// The reasoning text of a reply: the `Thought` field, or whatever precedes
/// the first label when the model skipped it.
pub fn extract_thought(text: &str) -> String {
    thought_of(text, &fields(text))
}

fn thought_of(text: &str, fields: &[Field]) -> String {
    match first(fields, Label::Thought) {
        Some(f) => text[f.content_start..f.end].trim().to_string(),
        None => {
            let end = fields.first().map_or(text.len(), |f| f.start);
            text[..end].trim().to_string()
        }
    }
}

/// Parse one backend reply.
pub fn parse_reply(text: &str) -> Result<ParsedReply, ParseError> {
    let fields = fields(text);
    let thought = thought_of(text, &fields);

    // Everything after the label, including any later labels the model
    // kept writing, belongs to the answer.
    if let Some(answer) = first(&fields, Label::FinalAnswer) {
        return Ok(ParsedReply {
            thought,
            decision: Decision::Finish {
                answer: text[answer.content_start..].trim().to_string(),
            },
        });
    }

    let action = first(&fields, Label::Action)
        .map(|f| action_name(&text[f.content_start..f.end]))
        .filter(|name| !name.is_empty());
    let input = first(&fields, Label::ActionInput).map(|f| &text[f.content_start..f.end]);

    match (action, input) {
        (None, None) => Err(ParseError::NoActionOrAnswer),
        (None, Some(_)) => Err(ParseError::MissingAction),
        (Some(action), None) => Err(ParseError::MissingActionInput { action }),
        (Some(tool), Some(raw)) => Ok(ParsedReply {
            thought,
            decision: Decision::Act {
                tool,
                input: normalize_input(raw)?,
            },
        }),
    }
}

/// First non-empty line, without markdown decoration.
fn action_name(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c: char| c == '`' || c == '*' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Resolve raw input text into a literal or a structured mapping.
pub fn normalize_input(raw: &str) -> Result<ActionInput, ParseError> {
    let text = strip_fences(raw.trim());

    if !text.starts_with('{') {
        return Ok(ActionInput::literal(text));
    }

    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value,
        // Models often quote keys and strings with single quotes.
        Err(first_err) => serde_json::from_str(&text.replace('\'', "\"")).map_err(|_| {
            ParseError::InvalidStructuredInput {
                reason: first_err.to_string(),
            }
        })?,
    };

    ActionInput::structured(value).ok_or_else(|| ParseError::InvalidStructuredInput {
        reason: "expected a JSON object".into(),
    })
}

fn strip_fences(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json) up to the end of the opening line.
    let inner = match inner.find('\n') {
        Some(idx) => &inner[idx + 1..],
        None => inner,
    };
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}
