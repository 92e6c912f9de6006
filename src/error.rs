//! Error types.
//!
//! Application-level outcomes (404, 405, 500, ...) are expressed as HTTP
//! [`Response`](crate::Response) values, not as errors. The types here
//! cover the two places where something can actually fail: the listener
//! itself, and a handler that gives up.

use std::fmt;

use thiserror::Error;

/// The error type returned by nanoweb's fallible operations.
///
/// This surfaces infrastructure failures only: binding to a port or
/// accepting a connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure raised inside a route handler.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into a
/// `HandlerFault`, so `?` works inside handlers that return
/// `Result<_, HandlerFault>`. The dispatch boundary turns it into a generic
/// `500` response; the message is logged, never sent to the client.
///
/// `HandlerFault` must not implement `std::error::Error` itself: the
/// blanket `From` impl below would then overlap with `From<T> for T`.
pub struct HandlerFault(Box<dyn std::error::Error + Send + Sync + 'static>);

impl HandlerFault {
    /// Builds a fault from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(message.to_string().into())
    }

    /// The underlying error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl<E> From<E> for HandlerFault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self(Box::new(e))
    }
}

impl fmt::Debug for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerFault").field(&self.0).finish()
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_from_std_error() {
        let parse = "x".parse::<u32>().unwrap_err();
        let fault = HandlerFault::from(parse);
        assert_eq!(fault.to_string(), "invalid digit found in string");
    }

    #[test]
    fn test_fault_from_message() {
        let fault = HandlerFault::msg("database unreachable");
        assert_eq!(fault.to_string(), "database unreachable");
        assert_eq!(fault.inner().to_string(), "database unreachable");
    }
}
