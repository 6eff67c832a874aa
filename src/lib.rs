//! Civic Assist: community resource referral pipeline.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod search;
pub mod store;
