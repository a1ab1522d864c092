//! Streaming genetic algorithm service core.
//!
//! Runs concurrent optimization tasks, each a genetic algorithm over one of
//! a closed set of problem encodings, and streams per-generation progress to
//! the task's client:
//!
//! - **Travelling salesman** (`tsp`): permutation genomes, scored locally by
//!   closed-tour length.
//! - **Game playing agent** (`GPA`): timed action sequences, scored by the
//!   client (human-in-the-loop) through a correlation/timeout protocol.
//! - **Function optimization** (`function_optimization`): real vectors on the
//!   unit hypercube, scored locally by the sphere function.
//!
//! # Architecture
//!
//! [`ga`] holds the engine and knows nothing about task management;
//! [`tasks`] owns the directory of running engines and drives them over
//! tokio channels. The HTTP/WebSocket transport is left to the embedding
//! server: it deserializes a [`tasks::TaskRequest`], calls
//! [`tasks::Orchestrator::create_task`], and later hands a connection's
//! channels to [`tasks::drive_task`].

pub mod error;
pub mod ga;
pub mod random;
pub mod tasks;
