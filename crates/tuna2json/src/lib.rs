// Domain-driven module structure for tuna2json.

// Core infrastructure
pub mod conf;
pub mod parser;
pub mod filter;

// Pipeline stages and process lifecycle
pub mod pipeline;
pub mod runtime;
