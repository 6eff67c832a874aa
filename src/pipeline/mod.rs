//! Referral pipeline.
//!
//! Every chat turn flows through:
//! 1. `ContextInitializer::initialize()`: recent history for the session
//! 2. `NeedClassifier::classify()`: model decision, rules as backstop
//! 3. `ResourceSearcher::search()`: live search or static fallback
//! 4. `ResourceVerifier::verify()`: phone, website and address checks
//! 5. `ResponseAssembler::assemble()`: the reply text
//!
//! `UrlSanitizer` runs on every resource list before it leaves the crate.

pub mod catalog;
pub mod classifier;
pub mod context;
pub mod events;
pub mod parser;
pub mod processor;
pub mod response;
pub mod rules;
pub mod sanitizer;
pub mod search;
pub mod types;
pub mod verifier;

pub use processor::{CivicPipeline, CollaboratorStatus, PipelineDeps};
