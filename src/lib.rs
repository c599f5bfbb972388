//! # Fixture Query Agent
//!
//! A thin natural-language to MongoDB query translator.
//!
//! This library provides:
//! - A query agent that turns plain-English questions about sports fixtures
//!   into filter queries for a fixed "fixtures" collection
//! - Syntactic validation of generated queries against the document store's
//!   extended JSON dialect, with self-correction feedback on failure
//! - Integration with OpenRouter for LLM access
//!
//! ## Architecture
//!
//! The agent follows a generate/validate/retry cycle:
//! 1. Build the system prompt from the fixed schema and the current date
//! 2. Call the LLM, decode the completion into one of two response shapes
//! 3. Re-parse a successful response's query string with the same parser
//!    the document store would use
//! 4. Feed parse failures back to the LLM, retry until valid or the
//!    attempt bound is reached
//!
//! ## Example
//!
//! ```rust,ignore
//! use fixture_query_agent::{agent::QueryAgent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = QueryAgent::new(config);
//! let response = agent
//!     .translate("When will Arsenal play Man Utd?", chrono::Utc::now())
//!     .await?;
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod query;

pub use config::Config;
