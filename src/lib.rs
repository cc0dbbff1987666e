// THEORY:
// This file is the main entry point for the `spore_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (like a cultivation
// orchestrator).
//
// The primary goal is to export the `PlatePipeline` and its associated data
// structures (`ChamberConfig`, `CycleReport`, etc.) as the clean, high-level
// interface for the entire plate analysis engine. The individual analysis
// stages live in `core_modules` and stay reachable for callers that need a
// single stage (a time-lapse rebuild, a one-off snippet analysis) without
// the full cycle.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod storage;
