//! Task declaration and dispatch
//!
//! Tasks declare their field accesses up front so that launch can reject
//! undeclared writes and stale halos before any kernel runs.

pub mod task_data;
pub mod task_operations;

pub use task_data::{
    AccessPattern, DeviceDispatch, DispatchStats, ReadAccess, Task, TaskBuilder, WriteTarget,
};
pub use task_operations::{check_launch, run_task};
