//! Headless match runner for AI play, balance runs and CI verification.
//!
//! This crate drives a [`frontline_core`] simulation without graphics:
//!
//! - **External control**: a controller process plays one or more factions
//!   by writing JSON commands to stdin and reading responses from stdout
//! - **Built-in AI**: profile-driven opponents that build, produce, expand
//!   and attack through the same order API as external controllers
//! - **Batch runs**: many AI-vs-AI matches in parallel for balance analysis
//! - **Determinism checks**: the same seed must always end on the same hash
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (tick, move, place, trade, ...)
//! - **stdout**: Responses and state (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] for the full command/response set.
//!
//! # Example
//!
//! ```bash
//! # Play faction 0 against the balanced AI
//! echo '{"cmd":"tick","count":60}' | cargo run -p frontline_headless
//!
//! # Verify determinism
//! cargo run -p frontline_headless -- verify --seed 12345 --runs 5
//! ```

pub mod ai;
pub mod batch;
pub mod match_runner;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use ai::{AiController, AiProfile};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use match_runner::{run_match, FactionReport, MatchReport};
pub use protocol::{Command, MatchState, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Controller, Scenario};
