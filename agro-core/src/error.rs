use thiserror::Error;

/// Failure of a single call into the geocoding, forecast or generation services.
#[derive(Debug, Error)]
pub enum AgroError {
    /// Network failure, timeout, or a non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The geocoding provider returned no candidate for the query.
    #[error("No location found for '{0}'")]
    NotFound(String),

    /// The provider answered, but the payload was missing an expected field.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The text-generation backend failed (quota, timeout, unusable reply).
    #[error("Advice unavailable: {0}")]
    Backend(String),

    /// Input rejected before any request was made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AgroError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgroError::Transport(_))
    }

    /// Map a reqwest failure on a weather call into a transport or decode error.
    pub(crate) fn from_weather_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            AgroError::MalformedResponse(format!("{context}: {err}"))
        } else if err.is_timeout() {
            AgroError::Transport(format!("{context}: request timed out"))
        } else {
            AgroError::Transport(format!("{context}: {err}"))
        }
    }

    /// Map any reqwest failure on a backend call into a backend error.
    pub(crate) fn from_backend_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgroError::Backend(format!("{context}: request timed out"))
        } else {
            AgroError::Backend(format!("{context}: {err}"))
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_transient() {
        assert!(AgroError::Transport("timeout".into()).is_transient());
        assert!(!AgroError::NotFound("x".into()).is_transient());
        assert!(!AgroError::MalformedResponse("x".into()).is_transient());
        assert!(!AgroError::Backend("x".into()).is_transient());
        assert!(!AgroError::InvalidInput("x".into()).is_transient());
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("quota exceeded"), "quota exceeded");
    }

    #[test]
    fn truncate_body_cuts_on_char_boundary() {
        let body = "é".repeat(150);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 203);
    }
}
