//! Job intake: the entity, the bounded work queue the worker pool drains,
//! and the in-flight dedupe tracker shared between the discovery loop and
//! the workers.

pub mod job;
pub mod queue;
pub mod tracker;

pub use job::Job;
pub use queue::WorkQueue;
pub use tracker::InFlightTracker;
