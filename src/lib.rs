//! Therapy onboarding: account registration wizard core.

pub mod config;
pub mod error;
pub mod wizard;
