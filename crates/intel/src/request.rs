use reqwest::Url;

use chainwatch_core::{Credential, Error, Result};

/// One GET against the intelligence API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntelRequest {
    pub section: String,
    pub selections: Vec<String>,
}

impl IntelRequest {
    pub fn new(section: &str, selections: &[&str]) -> Self {
        Self {
            section: section.to_string(),
            selections: selections.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The poll request: profile, chain, faction roster and enemy roster in
    /// one round trip.
    pub fn composite() -> Self {
        Self::new("user", &["profile", "chain", "faction", "enemy"])
    }

    /// `{base}/{section}/?selections=a,b&key=...`, query values encoded.
    pub fn url(&self, base_url: &str, credential: &Credential) -> Result<Url> {
        let endpoint = format!("{}/{}/", base_url.trim_end_matches('/'), self.section);
        let selections = self.selections.join(",");
        Url::parse_with_params(
            &endpoint,
            &[("selections", selections.as_str()), ("key", credential.expose())],
        )
        .map_err(|e| Error::Config(format!("Invalid API base URL: {}", e)))
    }
}
