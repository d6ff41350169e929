//! The orchestration loop and the reminder trigger.
//!
//! [`AgentLoop`] turns one natural-language instruction into zero or more
//! tool calls and a final text answer:
//!
//! 1. **Seed** the conversation with the system instruction and the user text
//! 2. **Request** a completion with the tool definitions attached
//! 3. **Decide** on the finish reason
//! 4. **If tool calls**: execute them in order, append results, go to step 2
//! 5. **Otherwise**: return text (the answer or a fixed fallback)
//!
//! [`ReminderTrigger`] reuses the same loop for the scheduled reminder.

pub mod loop_runner;
pub mod reminder;

pub use loop_runner::{AgentLoop, Termination, TurnOutcome};
pub use reminder::{ReminderOutcome, ReminderTrigger};
