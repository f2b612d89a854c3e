//! Document chat backend: retrieval-augmented generation over a local
//! document collection, served over HTTP.

pub mod core;
pub mod llm;
pub mod rag;
pub mod server;
pub mod session;
pub mod state;
