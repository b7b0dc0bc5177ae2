//! Download-host URL patterns and canonicalization.

use regex::Regex;

/// Precompiled patterns for one download host
#[derive(Debug, Clone)]
pub struct HostPatterns {
    host: String,
    api_file: Regex,
    user_file: Regex,
    onclick: Regex,
    absolute: Regex,
}

impl HostPatterns {
    pub fn new(host: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(host);
        Ok(Self {
            host: host.to_string(),
            api_file: Regex::new(&format!(r"{escaped}/api/file/([A-Za-z0-9_-]+)"))?,
            user_file: Regex::new(&format!(r"{escaped}/u/([A-Za-z0-9_-]+)"))?,
            onclick: Regex::new(&format!(r#"{escaped}/[^\s'"`)]+"#))?,
            absolute: Regex::new(&format!(r#"https?://(?:www\.)?{escaped}/[^\s'"`<>)\\]+"#))?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether `url` mentions the host at all
    pub fn mentions_host(&self, url: &str) -> bool {
        url.contains(&self.host)
    }

    /// Host-relative target inside an inline click handler, as an https URL
    pub fn onclick_target(&self, handler: &str) -> Option<String> {
        self.onclick
            .find(handler)
            .map(|m| format!("https://{}", m.as_str()))
    }

    /// First absolute URL on the host inside arbitrary text
    pub fn first_absolute(&self, text: &str) -> Option<String> {
        self.absolute.find(text).map(|m| m.as_str().to_string())
    }

    /// Rewrite any known page variant to the canonical API-file URL
    ///
    /// `…/api/file/<id>` and `…/u/<id>` both become
    /// `https://<host>/api/file/<id>`; anything else is returned unchanged.
    pub fn normalize(&self, url: &str) -> String {
        let id = self
            .api_file
            .captures(url)
            .or_else(|| self.user_file.captures(url))
            .and_then(|caps| caps.get(1));

        match id {
            Some(id) => format!("https://{}/api/file/{}", self.host, id.as_str()),
            None => url.to_string(),
        }
    }
}
