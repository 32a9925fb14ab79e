//! HTTP Surface: a thin `actix-web` adapter over the retrieval engine.
//! Split into a library (this crate) plus a thin `main.rs` binary, same
//! as ConHub's `auth` and `billing` services, so integration tests can
//! exercise the real routing against in-memory fakes.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;
