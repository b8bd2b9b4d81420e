//! Request performance accounting.
//!
//! Each served file produces one [`LogRecord`] carrying the worker's CPU time,
//! measured by [`CpuMeter`], and is appended to the shared [`AccessLog`].

pub mod access_log;
pub mod cpu;

pub use access_log::{AccessLog, AccessLogError, LogRecord};
pub use cpu::{CpuMeter, MeteredRead, thread_cpu_time};
