//! The agent loop: the orchestration core of ragent.
//!
//! Each inbound message runs one **turn**:
//!
//! 1. **Record** the user message in the session window
//! 2. **Retrieve** context documents for the message
//! 3. **Assemble** the prompt (history, context, tools, tool results)
//! 4. **Call the model** via the configured gateway
//! 5. **If tool calls**: execute them, fold results into the next prompt, loop to step 3
//! 6. **If a response**: record it as the assistant event and return it
//!
//! The loop stops with an error when the model keeps asking for tools past
//! the iteration cap, when the gateway fails, or when the turn deadline
//! passes.

pub mod loop_runner;
pub mod prompt;

pub use loop_runner::{AgentError, AgentLoop, TurnOutcome};
pub use prompt::{Prompt, PromptAssembler, PromptMessage};
