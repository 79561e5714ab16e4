use thiserror::Error;

/// Errors produced while decoding a message file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The document does not contain a complete header block (two
    /// delimiter lines).
    #[error("Malformed header: missing delimiter block")]
    MalformedHeader,

    /// A required header field is absent.
    #[error("Missing required header field `{0}`")]
    MissingField(&'static str),

    /// A timestamp field could not be parsed by any accepted format.
    #[error("Invalid timestamp `{0}`")]
    InvalidDate(String),

    /// The sender cannot appear in a message filename; only lowercase
    /// alphanumerics survive the grammar, and a file outside the grammar
    /// is invisible to every client.
    #[error("Invalid sender `{0}`: must be alphanumeric")]
    InvalidSender(String),

    /// The tag would not survive the `tags: [..]` header round-trip.
    #[error("Invalid tag `{0}`")]
    InvalidTag(String),
}
