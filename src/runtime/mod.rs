//! 运行时模块：命名的周期任务调度。
//!
//! # Runtime Module
//!
//! [`TaskScheduler`] replaces ad-hoc interval timers: every recurring piece of
//! work (batch flush timer, cache sweeps, one task per content schedule) is a
//! named task, and a name maps to at most one live task.

mod scheduler;

pub use scheduler::{TaskScheduler, Trigger};
