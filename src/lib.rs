//! saasbridge - Model Context Protocol adapters for SaaS APIs
//!
//! One process serves one adapter (answer/search or deployment platform) over
//! streamable HTTP, SSE or stdio. The library exposes the pieces so integration
//! tests can drive the router with a mocked vendor.

pub mod adapters;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod state;
pub mod stdio;
pub mod tools;
pub mod vendor;

// Re-export key types for convenience
pub use config::{AdapterKind, Config, TransportMode};
pub use context::{CredentialPolicy, CredentialResolver, Precedence, RequestContext, TransportKind};
pub use error::{AppError, Result, ToolError};
pub use protocol::Dispatcher;
pub use state::AppState;
pub use tools::{ToolRegistry, ToolResult};
pub use vendor::{HttpVendor, Method, VendorApi, VendorRequest};
