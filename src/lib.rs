//! Evolving personal fact memory for conversational agents.
//!
//! keepsake listens to what a user says, pulls out durable facts about them
//! ("User's name is Alex", "User's dog's birthday is June 5"), and hands the
//! relevant ones back as a short context block before the agent answers. It
//! is an [MCP](https://modelcontextprotocol.io/) server; the agent calls
//! `learn_from_utterance` every turn and `get_context` before replying.
//!
//! # Architecture
//!
//! - **Facts**: one JSON document, rewritten atomically after each change.
//!   Similar facts are merged: the more specific wording wins.
//! - **Extraction**: a regex pattern engine that always runs, plus an
//!   optional language model (Ollama) that degrades to nothing when absent.
//!   Both reject greetings and acknowledgements before looking for facts.
//! - **Recall**: [sqlite-vec](https://github.com/asg017/sqlite-vec) search
//!   over all-MiniLM-L6-v2 embeddings (ONNX Runtime), falling back to
//!   synonym-expanded keyword search.
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP/SSE
//!
//! # Modules
//!
//! - [`config`]: TOML config file plus environment overrides
//! - [`facts`]: fact types, the JSON store, dedup and the training export
//! - [`extraction`]: pattern and model-assisted extraction engines
//! - [`embedding`], [`db`], [`semantic`]: the optional embedding index
//! - [`coordinator`]: learning, recall and session statistics
//! - [`server`], [`tools`]: the MCP surface

pub mod config;
pub mod coordinator;
pub mod db;
pub mod embedding;
pub mod extraction;
pub mod facts;
pub mod semantic;
pub mod server;
pub mod tools;
