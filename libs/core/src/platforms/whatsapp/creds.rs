use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v18.0";

/// Credentials and endpoint coordinates for the Cloud API send endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct WhatsAppCredentials {
    pub phone_number_id: String,
    pub access_token: String,
    pub api_version: String,
    pub api_base: String,
}

impl WhatsAppCredentials {
    pub fn new(phone_number_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.into(),
            api_base: DEFAULT_API_BASE.into(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// `{base}/{version}/{phone_number_id}`; also the token-check endpoint.
    pub fn phone_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_base.trim_end_matches('/'),
            self.api_version.trim_matches('/'),
            self.phone_number_id
        )
    }

    pub fn messages_url(&self) -> String {
        format!("{}/messages", self.phone_url())
    }
}

impl fmt::Debug for WhatsAppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppCredentials")
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("api_base", &self.api_base)
            .finish()
    }
}
