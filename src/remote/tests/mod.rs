//! Unit tests for the remote module.

mod ssh;
mod tunnel;
