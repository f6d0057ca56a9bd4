//! Tool catalog, validation and dispatch shared by every adapter.

pub mod registry;
pub mod schema;

pub use registry::{ContentBlock, Registry, ToolKind, ToolRegistry, ToolResult, Toolbox};
pub use schema::{ArgumentValidator, Arguments, ParamKind, ParamSpec, ToolDescriptor};
