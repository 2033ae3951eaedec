use thiserror::Error;

/// Errors produced while decoding bytes received from a remote host.
///
/// Every variant describes malformed or truncated input, so callers treat
/// them as protocol errors: log, drop the message, keep the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Tried to read past the end of the buffer
    #[error("Unexpected end of buffer: needed {needed} more byte(s) but only {remaining} remain")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A variable-length integer used more bytes than its type allows
    #[error("Variable-length integer overflowed 64 bits")]
    VariableIntegerOverflow,

    /// A byte did not map to any value of the target type
    #[error("Invalid value {value} while decoding {type_name}")]
    InvalidValue { type_name: &'static str, value: u64 },

    /// A string payload was not valid UTF-8
    #[error("String payload is not valid UTF-8")]
    InvalidUtf8,

    /// A sequence length prefix exceeded the allowed maximum
    #[error("Sequence length {length} exceeds limit of {limit}")]
    LengthLimitExceeded { length: u64, limit: u64 },
}
