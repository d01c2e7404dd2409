pub(crate) mod async_task;
mod signals;

pub use signals::*;

#[cfg(test)]
mod async_task_test;
