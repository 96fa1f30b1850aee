//! Integration test modules.

mod commands;
mod membership;
mod movement;
mod resolution;
mod storage;
