//! Waypoint Chain - Discovery Chain Compiler
//!
//! Compiles the routing config entries related to a service into the routing
//! graph a proxy for that service follows. See [`compiler`] for the rules.

pub mod compiler;

pub use compiler::{
    compile, default_chain, ChainCompiler, CompileRequest, CompileResult, DiscoveryChainCompiler,
};
