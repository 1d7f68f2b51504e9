use thiserror::Error;

/// Error kinds the core distinguishes, independent of any back-end or
/// transport.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown file or decomposition handle.
    #[error("bad id")]
    BadId,

    /// Null required pointers, non-positive counts, variable id out of
    /// range.
    #[error("bad argument: {0}")]
    BadArg(&'static str),

    /// Write called on a read-only file.
    #[error("permission denied")]
    Permission,

    /// Unrecognised back-end selector.
    #[error("bad iotype")]
    BadIotype,

    /// Element type has no known default fill and no fill was supplied.
    #[error("bad type")]
    BadType,

    /// Arena or system allocator refused.
    #[error("out of memory")]
    OutOfMemory,

    /// Message primitive returned non-success. Carries the failing call
    /// site so the log line can point at it.
    #[error("transport error at {site}: {message}")]
    Transport { site: &'static str, message: String },
}

/// Build a [`Error::Transport`] tagged with the call site of the macro
/// invocation.
#[macro_export]
macro_rules! transport_err {
    ($msg:expr) => {
        $crate::error::Error::Transport {
            site: concat!(file!(), ":", line!()),
            message: $msg.to_string(),
        }
    };
}
