use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for upload token issuance and checking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Maximum age of an upload token, in seconds. `None` disables expiry:
    /// tokens then carry their issue time for clients to judge, and the node
    /// accepts them for as long as the signature and the controller account
    /// still check out.
    pub max_token_age_secs: Option<u64>,
}

impl AuthConfig {
    /// Tokens expire `age` after issuance.
    pub fn with_max_token_age(age: Duration) -> Self {
        Self {
            max_token_age_secs: Some(age.as_secs()),
        }
    }

    pub fn max_token_age(&self) -> Option<Duration> {
        self.max_token_age_secs.map(Duration::from_secs)
    }
}
