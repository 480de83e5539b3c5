//! Reconnect policy
//!
//! Classifies session failures and decides between RESUME, full RECONNECT,
//! and giving up.

mod config;
mod failure;
mod policy;

pub use config::ReconnectConfig;
pub use failure::{FailureClassification, SessionFailure, ABNORMAL_CLOSURE};
pub use policy::{
    AttemptObserver, GiveUp, NextState, Outcome, ReconnectAttempt, ReconnectContext,
};
