//! The Stepwise agent loop.
//!
//! The agent follows a **Reason → Act → Observe** cycle:
//!
//! 1. **Build the prompt** from the goal, the visible tool catalog and the
//!    transcript so far
//! 2. **Ask the backend** for the next move
//! 3. **Parse** the reply into an action or a final answer
//! 4. **If an action**: dispatch it through the tool registry, record the
//!    observation, loop back to step 1
//! 5. **If a final answer**: the run completes
//!
//! The loop also stops on a fatal backend error, when the iteration budget
//! is spent, or when the run is cancelled.

pub mod cancel;
pub mod parser;
pub mod prompt;
pub mod react_loop;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use cancel::CancelToken;
pub use parser::{Decision, ParseError, ParsedReply, parse_reply};
pub use react_loop::{ReactLoop, RunHandle};
pub use stream_event::RunEvent;
