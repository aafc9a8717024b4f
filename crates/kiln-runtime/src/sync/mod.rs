//! Object monitors
//!
//! Java-style monitors on native threads: any heap object can be locked,
//! waited on, and notified. The primitives behind a monitor are created the
//! first time they are needed and live as long as the process.

mod guard;
mod monitor;

pub use guard::MonitorGuard;
pub use monitor::{holds_lock, lock, notify, notify_all, unlock, wait, MonitorError, MonitorLock, WaitSet};

pub(crate) use monitor::wake_waiters;
