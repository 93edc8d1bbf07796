//! Failure types surfaced by the collaborators and the single function that
//! turns any of them into a line of text for the widget.

use thiserror::Error;

/// Weather client failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {status_text}")]
    Status { status: u16, status_text: String },

    /// The body could not be decoded.
    #[error("Failed to decode weather response: {0}")]
    Decode(String),
}

/// Location resolver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Geolocation unavailable")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Location(#[from] LocationError),

    /// Anything outside the collaborators' own failures, such as a request
    /// task that panicked.
    #[error("{0}")]
    Other(String),
}

pub const NETWORK_MESSAGE: &str = "Network error: please check your connection.";
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: check your API key.";
pub const NOT_FOUND_MESSAGE: &str = "Location not found. Try another city name.";
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again in a moment.";
pub const UNAVAILABLE_MESSAGE: &str = "Weather service is unavailable. Please retry later.";
pub const REQUEST_FAILED_MESSAGE: &str = "Request failed.";
pub const PERMISSION_DENIED_MESSAGE: &str = "Location permission denied.";
pub const POSITION_UNAVAILABLE_MESSAGE: &str =
    "Location unavailable. Check your signal or device settings.";
pub const LOCATION_TIMEOUT_MESSAGE: &str = "Location request timed out. Please try again.";
pub const INTERRUPTED_MESSAGE: &str = "The weather request was interrupted. Please try again.";
pub const FALLBACK_MESSAGE: &str = "Unable to fetch weather right now.";

/// Map a failure to the message shown in the widget. Always non-empty.
pub fn describe_error(err: &WidgetError) -> String {
    match err {
        WidgetError::Fetch(FetchError::Transport(_)) => NETWORK_MESSAGE.to_string(),
        WidgetError::Fetch(FetchError::Status { status, status_text }) => {
            describe_status(*status, status_text)
        }
        WidgetError::Fetch(err @ FetchError::Decode(_)) => err.to_string(),
        WidgetError::Location(LocationError::PermissionDenied) => {
            PERMISSION_DENIED_MESSAGE.to_string()
        }
        WidgetError::Location(LocationError::PositionUnavailable) => {
            POSITION_UNAVAILABLE_MESSAGE.to_string()
        }
        WidgetError::Location(LocationError::Timeout) => LOCATION_TIMEOUT_MESSAGE.to_string(),
        WidgetError::Location(err @ LocationError::Unsupported) => err.to_string(),
        WidgetError::Other(message) if !message.trim().is_empty() => message.clone(),
        WidgetError::Other(_) => FALLBACK_MESSAGE.to_string(),
    }
}

fn describe_status(status: u16, status_text: &str) -> String {
    match status {
        // Some stacks report a dropped connection as status 0.
        0 => NETWORK_MESSAGE.to_string(),
        401 => UNAUTHORIZED_MESSAGE.to_string(),
        404 => NOT_FOUND_MESSAGE.to_string(),
        429 => RATE_LIMIT_MESSAGE.to_string(),
        s if s >= 500 => UNAVAILABLE_MESSAGE.to_string(),
        _ if !status_text.trim().is_empty() => status_text.to_string(),
        _ => REQUEST_FAILED_MESSAGE.to_string(),
    }
}
