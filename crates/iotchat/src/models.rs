//! These models represent the objects passed around by the pipeline
//!
//! There are two formats we need to interact with:
//! - vercel useChat UI messages, sent from the interface to the server
//! - openai chat messages, sent from the agents to the LLM
//!
//! Incoming UI messages are loosely typed JSON, so they are converted into
//! `ChatMessage` on arrival and never round-tripped. LLM messages use the
//! internal `Message` type and are converted to the provider format in
//! `providers::utils`.
pub mod chat;
pub mod message;
pub mod role;
