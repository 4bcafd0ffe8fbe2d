//! # Dispatch: receive loop, fan-out, acknowledgement.
//!
//! One [`InputDispatcher`] per queue subscription. It long-polls the
//! queue, broadcasts each message to every matching reactor under a
//! runtime-adjustable hand-off budget ([`DynamicSemaphore`]), tracks how
//! many reactors still owe an outcome per delivery, and deletes the
//! source message only when every one of them succeeded.
//!
//! Internal modules:
//! - [`semaphore`]  the adjustable concurrency budget
//! - [`dispatcher`] the receive loop and ack bookkeeping

mod dispatcher;
mod semaphore;

pub use dispatcher::InputDispatcher;
pub use semaphore::DynamicSemaphore;
