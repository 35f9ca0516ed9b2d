//! Optional structured logging.
//!
//! With the `tracing` feature enabled, `trace_event!` forwards to
//! `tracing::event!`; without it the macro expands to nothing and its
//! arguments are never evaluated.

#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::event!(::tracing::Level::$level, $($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {};
}

pub(crate) use trace_event;
