pub mod context;

pub use context::request_context_middleware;
