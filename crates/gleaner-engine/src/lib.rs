//! Gleaner Workflow Engine
//!
//! Runs a validated [`WorkflowGraph`](gleaner_workflow::WorkflowGraph): every
//! node is an independent task, every edge a sentinel-terminated queue, and a
//! failing node poisons all of its downstream queues so its transitive
//! dependents fail fast instead of waiting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowRunner                         │
//! │  - owns mpsc trigger channel and optional interval          │
//! │  - re-reads the workflow source for every run               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - registry and config, hands out WorkflowExecutions        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    WorkflowExecution                        │
//! │  - one queue per edge, FanOut per producer                  │
//! │  - spawns node tasks, tracks the StatusBoard                │
//! │  - stops producers nobody waits on, collects the RunReport  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         NodeTask                            │
//! │  - assembles input sets, enforces the input wait bound      │
//! │  - invokes the step, forwards End/Failed sentinels          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gleaner_engine::{Engine, EngineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = Engine::new(Arc::new(registry), EngineConfig::default());
//! let report = engine
//!   .run_spec("a: static type=x id=1\nb: sink\na -> b\n", CancellationToken::new())
//!   .await?;
//! assert!(report.succeeded());
//! ```

mod config;
mod engine;
mod error;
mod events;
mod execution;
mod node;
mod queue;
mod report;
mod runner;
mod status;

pub use config::{DEFAULT_TIMEOUT_MS, EngineConfig};
pub use engine::Engine;
pub use error::RunnerError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::WorkflowExecution;
pub use queue::{FanOut, Message, QueueClosed, QueueReceiver, QueueSender, channel};
pub use report::{NodeReport, RunReport};
pub use runner::{WorkflowRunner, WorkflowSource};
pub use status::{NodeStatus, StatusBoard};
