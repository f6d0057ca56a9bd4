pub mod health;
pub mod mcp;
pub mod sse;

pub use health::health_handler;
pub use mcp::{mcp_method_not_allowed, mcp_post_handler};
pub use sse::{message_handler, sse_handler};
