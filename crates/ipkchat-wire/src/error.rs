/// Errors produced while building or encoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A field exceeds its protocol length limit.
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A field contains bytes outside its allowed character set.
    #[error("{field} may only contain {allowed}")]
    IllegalCharacters {
        field: &'static str,
        allowed: &'static str,
    },

    /// The intent never leaves the client and has no wire form.
    #[error("{0} is a local intent with no wire encoding")]
    LocalIntent(&'static str),
}

pub type Result<T> = std::result::Result<T, WireError>;
