//! Retrieval engine, vector store facade, and session/artifact model for
//! multimodal context assembly.
//!
//! This crate implements the hard engineering behind the HTTP surface:
//! the Metadata Store (`store`), the Blob Store (`blob`), the Vector
//! Index (`vector_index`), the Embedding Client (`embedding`), the
//! Retrieval Engine (`engine`), and the Context Assembler (`assembler`).

pub mod assembler;
pub mod blob;
pub mod cache;
pub mod clock;
pub mod domain;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod store;
pub mod vector_index;

pub use engine::{RetrievalEngine, SearchRequest};
pub use error::EngineError;
