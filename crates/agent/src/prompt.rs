//! Prompt builder for the REASONING phase.
//!
//! The prompt is rebuilt from scratch every iteration: preamble, tool
//! catalog, goal, then the whole transcript so far.

use std::fmt::Write as _;
use std::path::Path;

use stepwise_core::{Step, ToolDescriptor, Transcript};

const PREAMBLE: &str = "\
You are an autonomous agent that completes a goal by reasoning step by step \
and using tools. Answer in exactly one of these two formats.

To use a tool:

Thought: <your reasoning about what to do next>
Action: <one tool name from [{tool_names}]>
Action Input: <the input for the tool, plain text or a JSON object>

When you know the answer:

Thought: <your reasoning>
Final Answer: <the answer to the goal>

Never write an Observation yourself; it will be provided after each action.";

/// Everything a prompt is built from, apart from the clock.
pub struct PromptContext<'a> {
    pub goal: &'a str,
    pub tools: &'a [&'a ToolDescriptor],
    pub transcript: &'a Transcript,
    pub working_dir: &'a Path,
}

/// Render the full prompt for one REASONING step.
pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let tool_names = ctx
        .tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = PREAMBLE.replace("{tool_names}", &tool_names);
    prompt.push_str("\n\nAvailable tools:\n");
    prompt.push_str(&render_catalog(ctx.tools));
    let _ = write!(
        prompt,
        "\n\nCurrent date and time: {now}\nWorking directory: {}\n\nGoal: {}\n\nHistory:\n{}\n\nThought:",
        ctx.working_dir.display(),
        ctx.goal,
        render_history(ctx.transcript),
    );
    prompt
}

/// One `- name: description` line per tool.
pub fn render_catalog(tools: &[&ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "No tools are available.".into();
    }
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_history(transcript: &Transcript) -> String {
    if transcript.is_empty() {
        return "No history yet.".into();
    }
    transcript
        .iter()
        .map(render_step)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_step(step: &Step) -> String {
    let action = step.action.as_deref().unwrap_or("");
    let input = step
        .action_input
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    format!(
        "Thought: {}\nAction: {action}\nAction Input: {input}\nObservation: {}",
        step.thought, step.observation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::{ActionInput, ObservationKind, RunState};

    fn descriptor(name: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: description.into(),
            dangerous: false,
        }
    }

    #[test]
    fn empty_history() {
        assert_eq!(render_history(&Transcript::new()), "No history yet.");
    }

    #[test]
    fn history_lists_each_step() {
        let mut state = RunState::new("goal");
        state
            .record(Step::acted(
                "look",
                "list_dir",
                ActionInput::literal("."),
                "a.txt",
                ObservationKind::Output,
            ))
            .unwrap();
        state
            .record(Step::parse_error("hm", "Error: bad reply"))
            .unwrap();

        let history = render_history(state.transcript());
        assert_eq!(
            history,
            "Thought: look\nAction: list_dir\nAction Input: .\nObservation: a.txt\n\n\
             Thought: hm\nAction: \nAction Input: \nObservation: Error: bad reply"
        );
    }

    #[test]
    fn prompt_contains_catalog_goal_and_names() {
        let list = descriptor("list_dir", "List a directory");
        let read = descriptor("read_file", "Read a file");
        let tools = [&list, &read];
        let transcript = Transcript::new();
        let prompt = build_prompt(&PromptContext {
            goal: "list files in the workspace",
            tools: &tools,
            transcript: &transcript,
            working_dir: Path::new("/srv/work"),
        });

        assert!(prompt.contains("[list_dir, read_file]"));
        assert!(prompt.contains("- list_dir: List a directory\n- read_file: Read a file"));
        assert!(prompt.contains("Goal: list files in the workspace"));
        assert!(prompt.contains("Working directory: /srv/work"));
        assert!(prompt.contains("No history yet."));
        assert!(prompt.ends_with("Thought:"));
    }

    #[test]
    fn empty_catalog() {
        assert_eq!(render_catalog(&[]), "No tools are available.");
    }
}
