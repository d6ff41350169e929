//! Chat channel implementations for Chorebot.
//!
//! - **Slack**: Web API delivery (`chat.postMessage`, `response_url`)
//! - **Console**: stdout, for local runs
//! - **response_url**: deferred slash-command answers, no token needed
//! - **signature**: Slack request signing (`v0` HMAC-SHA256)
//! - **payload**: slash command and Events API parsing

pub mod console;
pub mod payload;
pub mod response_url;
pub mod signature;
pub mod slack;

pub use console::ConsoleChannel;
pub use payload::{EventEnvelope, SlackEvent, SlashCommand};
pub use response_url::ResponseUrlClient;
pub use signature::{sign, verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use slack::SlackChannel;
