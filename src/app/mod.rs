//! Application layer: planning, execution and the plugin client.

pub mod client;
pub mod config;
pub mod executor;
pub mod limiter;
pub mod planner;
pub mod plugins;
pub mod send;

pub use client::{Backend, Client, Plugin};
pub use config::{DEFAULT_MAX_CONCURRENCY, TransactionPlanningConfig};
pub use executor::PlanExecutor;
pub use limiter::ConcurrencyLimiter;
pub use planner::{ComputeUnitLimitPolicy, TransactionPlanner};
pub use send::TransactionInput;
