// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::new_without_default)]

pub mod cli;
pub mod config;
pub mod error;
pub mod httpspec;
pub mod orchestrator;
pub mod report;
pub mod resilience;
pub mod samples;
pub mod transport;
pub mod verdict;
pub mod wire;
