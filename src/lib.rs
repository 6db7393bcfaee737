#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod behavior;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod liveness;
pub mod schedule;
pub mod session;

pub use error::{Error, Result};
