/// Failures on the chat path, from the network call through reply validation.
///
/// The `Display` text of every variant is what the UI shows in an `api-error`
/// event, so it is written for the end user.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Network request to the model API failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("The Gemini API is temporarily overloaded. Please wait a moment and try again.")]
    ServiceUnavailable,
    #[error("Rate limit exceeded. Please wait a few seconds and try again.")]
    RateLimited,
    #[error("Authentication failed. Please check your API key in the configuration.")]
    AuthFailure,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("API request failed ({status}): {detail}")]
    RequestFailed { status: u16, detail: String },
    #[error("Invalid response structure from API. Check the logs for details.")]
    InvalidResponseShape,
    #[error("Failed to parse JSON response from AI: {0}")]
    MalformedResponse(String),
    #[error("Response is not a valid object")]
    NotAnObject,
    #[error("Response missing valid \"message\" field")]
    MissingMessage,
    #[error("Response has invalid \"function\" field")]
    InvalidFunctionField,
}

// The API key travels in the query string, so the URL never reaches `Display`.
impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Transport(err.without_url())
    }
}

impl AgentError {
    /// True for errors raised while validating the model's own payload, as
    /// opposed to failures reaching the API.
    pub fn is_reply_error(&self) -> bool {
        matches!(
            self,
            AgentError::MalformedResponse(_)
                | AgentError::NotAnObject
                | AgentError::MissingMessage
                | AgentError::InvalidFunctionField
        )
    }
}
