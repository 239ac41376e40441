//! Coach Carter: retrieval-augmented fitness coaching service.
//!
//! A question flows `api` → `engine` (retrieve from the `coach_store`
//! knowledge base, assemble the prompt, call the LLM) → `coaching`
//! post-processing (exercise links, risk and effectiveness scores).

pub mod api;
pub mod coaching;
pub mod config;
pub mod engine;
pub mod models;
pub mod profile;
