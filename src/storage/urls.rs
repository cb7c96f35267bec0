use url::Url;

/// Maps a stored object key to the URL clients fetch it from.
#[derive(Debug, Clone)]
pub struct ImageUrlResolver {
    base: Url,
}

impl ImageUrlResolver {
    pub fn new(public_url: &str) -> Result<Self, url::ParseError> {
        // Url::join drops the last path segment unless the base ends in '/'.
        let normalized = if public_url.ends_with('/') {
            public_url.to_string()
        } else {
            format!("{}/", public_url)
        };
        Ok(Self {
            base: Url::parse(&normalized)?,
        })
    }

    pub fn resolve(&self, key: &str) -> String {
        match self.base.join(key) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(key, "Could not join image key onto base URL: {}", e);
                format!("{}{}", self.base, key)
            }
        }
    }
}
