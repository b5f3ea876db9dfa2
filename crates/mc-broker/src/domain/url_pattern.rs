//! Match patterns for `externally_connectable.matches`.
//!
//! Supported forms:
//!
//! - `<all_urls>`
//! - `<scheme>://<host>/<path>` where scheme is `http`, `https`, `file` or
//!   `*` (http or https), host is `*`, `*.<domain>` or a literal host, and
//!   path is a glob using `*`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Reasons a pattern string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlPatternError {
    #[error("Missing \"://\" in pattern {0:?}")]
    MissingSchemeSeparator(String),

    #[error("Unsupported scheme in pattern {0:?}")]
    InvalidScheme(String),

    #[error("Empty host in pattern {0:?}")]
    EmptyHost(String),

    #[error("Wildcard must be the first host label in pattern {0:?}")]
    InvalidHostWildcard(String),

    #[error("Missing path in pattern {0:?}")]
    MissingPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum SchemePattern {
    /// `*`: http or https.
    AnyWeb,
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum HostPattern {
    Any,
    /// `*.example.com`: the domain itself or any subdomain.
    Subdomains(String),
    Exact(String),
}

/// A parsed match pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPattern {
    source: String,
    all_urls: bool,
    scheme: SchemePattern,
    host: HostPattern,
    path: String,
}

impl UrlPattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, UrlPatternError> {
        if pattern == "<all_urls>" {
            return Ok(Self {
                source: pattern.to_string(),
                all_urls: true,
                scheme: SchemePattern::AnyWeb,
                host: HostPattern::Any,
                path: "/*".to_string(),
            });
        }

        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| UrlPatternError::MissingSchemeSeparator(pattern.to_string()))?;

        let scheme = match scheme {
            "*" => SchemePattern::AnyWeb,
            "http" | "https" | "file" => SchemePattern::Exact(scheme.to_string()),
            _ => return Err(UrlPatternError::InvalidScheme(pattern.to_string())),
        };

        let slash = rest
            .find('/')
            .ok_or_else(|| UrlPatternError::MissingPath(pattern.to_string()))?;
        let (host, path) = rest.split_at(slash);

        let is_file = matches!(&scheme, SchemePattern::Exact(s) if s == "file");
        let host = match host {
            "*" => HostPattern::Any,
            "" if is_file => HostPattern::Exact(String::new()),
            "" => return Err(UrlPatternError::EmptyHost(pattern.to_string())),
            h => match h.strip_prefix("*.") {
                Some(domain) if !domain.is_empty() && !domain.contains('*') => {
                    HostPattern::Subdomains(domain.to_ascii_lowercase())
                }
                Some(_) => return Err(UrlPatternError::InvalidHostWildcard(pattern.to_string())),
                None if h.contains('*') => {
                    return Err(UrlPatternError::InvalidHostWildcard(pattern.to_string()))
                }
                None => HostPattern::Exact(h.to_ascii_lowercase()),
            },
        };

        Ok(Self {
            source: pattern.to_string(),
            all_urls: false,
            scheme,
            host,
            path: path.to_string(),
        })
    }

    /// Whether `url` matches this pattern.
    ///
    /// `url` is parsed with WHATWG rules; anything unparseable never matches.
    /// The path glob sees the path followed by `?query` when there is one.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let scheme = url.scheme();

        let scheme_ok = match &self.scheme {
            SchemePattern::AnyWeb => scheme == "http" || scheme == "https",
            SchemePattern::Exact(expected) => expected == scheme,
        };
        if self.all_urls {
            return scheme_ok || scheme == "file";
        }
        if !scheme_ok {
            return false;
        }

        let host = url.host_str().unwrap_or_default();
        let host_ok = match &self.host {
            HostPattern::Any => true,
            HostPattern::Exact(expected) => expected == host,
            HostPattern::Subdomains(domain) => {
                host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        };
        if !host_ok {
            return false;
        }

        match url.query() {
            Some(query) => glob_match(&self.path, &format!("{}?{query}", url.path())),
            None => glob_match(&self.path, url.path()),
        }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for UrlPattern {
    type Err = UrlPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// `*`-only glob matching over bytes.
fn glob_match(pattern: &str, text: &str) -> bool {
    let (p, t) = (pattern.as_bytes(), text.as_bytes());
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&b| b == b'*')
}
