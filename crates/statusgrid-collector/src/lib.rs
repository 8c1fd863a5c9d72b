//! statusgrid-collector — the polling and caching engine.
//!
//! Periodically evaluates every configured service's health query, caches
//! the latest complete result set, and derives an aggregate outage state
//! grouped by display group.
//!
//! # Architecture
//!
//! ```text
//! Poller::run()  (one background task)
//!   ├── interval tick (first tick fires immediately)
//!   ├── poll_cycle(): JoinSet fan-out, one task per ServiceSpec
//!   │     └── Evaluator::evaluate() → MetricsClient::query() → ServiceResult
//!   │     results written back into their configuration-order slot
//!   └── ResultCache::set(results, cycle_start)
//!
//! Readers (any number, concurrent)
//!   └── ResultCache::snapshot() → StatusSnapshot
//!         ├── classify() → Outage::{None, Partial, Full}
//!         └── group()    → [default, first-seen groups...]
//! ```
//!
//! # Failure model
//!
//! A failing query never aborts a cycle: it becomes a `ServiceResult` with
//! `status = false` and `error` set. The next scheduled cycle is the retry.

pub mod aggregate;
pub mod cache;
pub mod evaluator;
pub mod poller;
pub mod prometheus;
pub mod snapshot;
pub mod types;

pub use aggregate::{Outage, ServiceGroup, classify, group};
pub use cache::{CacheEntry, ResultCache};
pub use evaluator::{Evaluator, evaluate, interpret};
pub use poller::Poller;
pub use prometheus::render_prometheus;
pub use snapshot::StatusSnapshot;
pub use types::{EvalError, ServiceResult, epoch_secs};
