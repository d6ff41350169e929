//! # Chorebot Core
//!
//! Domain types, traits, and error definitions for the chore-tracking bot.
//! This crate has **no framework dependencies**: it defines the domain
//! model that all other crates implement against.
//!
//! Every collaborator is a trait here (completion provider, tool, key-value
//! backend, chat channel). Implementations live in their own crates, which
//! keeps the orchestration loop testable with scripted stand-ins.

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage, InstructionSource};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use state::{ChoreState, KvBackend};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
