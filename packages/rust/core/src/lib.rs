//! Core pipeline orchestration and domain logic for sitrep.
//!
//! This crate ties together taxonomy loading, question embedding, passage
//! filtering, answer synthesis, and results persistence into the end-to-end
//! `generate_assessment_results` workflow.

pub mod annotate;
pub mod documents;
pub mod filter;
pub mod pipeline;
