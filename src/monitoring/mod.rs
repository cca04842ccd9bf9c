/*!
 * Monitoring
 * Structured tracing setup and per-thread spans
 */

mod tracer;

pub use tracer::{init_tracing, span_thread};
