//! Gatekeeping and dispatch layer for desktop automation.
//!
//! Exposes the protocol dispatcher, the closed tool registry, and the
//! line-delimited JSON-RPC serving loop. Every `tools/call` passes through
//! strict argument binding and the safety validator before any capability
//! provider is invoked.

pub mod dispatcher;
pub mod protocol;
pub mod registry;

pub use dispatcher::{serve, Dispatcher, Lifecycle, ServeReport};
pub use protocol::{
    error_frame, parse_request, request_frame, result_frame, DispatchError, ErrorCode,
    JsonRpcRequest, JSONRPC_VERSION, PROTOCOL_VERSION,
};
pub use registry::{
    bind_arguments, ArgKind, ArgSpec, BindError, BoundArgs, BoundValue, ToolRegistry, ToolSpec,
    MAX_COORDINATE, MAX_SCROLL_AMOUNT, MAX_TEXT_LENGTH, MAX_WAIT_SECONDS,
};
