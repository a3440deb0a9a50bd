/// Failures surfaced to the caller. Per-region crop and OCR failures are not
/// errors; they are recorded as a `RegionStatus` on the result.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "invalid input: {}", _0)]
    InvalidInput(String),
    #[fail(display = "{} unavailable: {}", collaborator, reason)]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },
    #[fail(display = "{} environment variable unset", _0)]
    MissingSetting(&'static str),
    #[fail(display = "internal error: {}", _0)]
    Internal(String),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    pub fn unavailable(collaborator: &'static str, reason: impl ToString) -> Self {
        Error::CollaboratorUnavailable {
            collaborator,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
