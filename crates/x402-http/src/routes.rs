//! Route patterns and the protected-route table.
//!
//! Routes are keyed as `"METHOD /path"`; the method is optional and its
//! absence means any method. Path matching is literal, with two extensions:
//! a `:name` segment captures one path segment as a parameter, and a
//! trailing `*` segment matches any remainder. When several patterns match a
//! request, the one with the longer literal prefix wins, so exact routes
//! always beat wildcards. Conflicting patterns are rejected when the table
//! is built.

use std::collections::HashMap;
use std::str::FromStr;

use x402_server::RouteConfig;

/// Raised at initialization when the route table is ambiguous or malformed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Route configuration invalid: {}", .problems.join("; "))]
pub struct RouteConfigurationError {
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A parsed `"METHOD /path"` route key.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    method: Option<String>,
    segments: Vec<Segment>,
}

/// Parameters captured from a matched path.
#[derive(Debug, Clone, Default)]
pub struct RouteMatch {
    pub params: HashMap<String, String>,
}

impl RoutePattern {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Checks the pattern against a request, capturing `:name` parameters.
    pub fn matches(&self, method: &str, path: &str) -> Option<RouteMatch> {
        if let Some(expected) = &self.method {
            if !expected.eq_ignore_ascii_case(method) {
                return None;
            }
        }
        let path_segments: Vec<&str> = split_path(path);
        let mut params = HashMap::new();
        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Wildcard => {
                    // Trailing wildcard consumes any remainder, including none.
                    return Some(RouteMatch { params });
                }
                Segment::Literal(expected) => {
                    if path_segments.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = path_segments.get(i)?;
                    params.insert(name.clone(), (*value).to_string());
                }
            }
            i += 1;
        }
        if i == path_segments.len() {
            Some(RouteMatch { params })
        } else {
            None
        }
    }

    /// Number of leading literal segments; higher wins when several patterns
    /// match.
    fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Two patterns conflict when they cover the same requests: identical
    /// shapes (parameter names aside) and overlapping method coverage.
    fn conflicts_with(&self, other: &RoutePattern) -> bool {
        let methods_overlap = match (&self.method, &other.method) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        };
        if !methods_overlap {
            return false;
        }
        if self.segments.len() != other.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(&other.segments)
            .all(|(a, b)| match (a, b) {
                (Segment::Literal(x), Segment::Literal(y)) => x == y,
                (Segment::Param(_), Segment::Param(_)) => true,
                (Segment::Wildcard, Segment::Wildcard) => true,
                _ => false,
            })
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

impl FromStr for RoutePattern {
    type Err = RouteConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (method, path) = match trimmed.split_once(' ') {
            Some((method, path)) if !method.starts_with('/') => {
                (Some(method.to_uppercase()), path.trim())
            }
            _ => (None, trimmed),
        };
        if !path.starts_with('/') {
            return Err(RouteConfigurationError {
                problems: vec![format!("route `{s}`: path must start with `/`")],
            });
        }
        let mut segments = Vec::new();
        let raw_segments = split_path(path);
        for (index, raw) in raw_segments.iter().enumerate() {
            if *raw == "*" {
                if index + 1 != raw_segments.len() {
                    return Err(RouteConfigurationError {
                        problems: vec![format!("route `{s}`: `*` must be the last segment")],
                    });
                }
                segments.push(Segment::Wildcard);
            } else if let Some(name) = raw.strip_prefix(':') {
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal((*raw).to_string()));
            }
        }
        Ok(RoutePattern {
            raw: trimmed.to_string(),
            method,
            segments,
        })
    }
}

/// The table of protected routes, checked for conflicts at construction.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<(RoutePattern, RouteConfig)>,
}

impl RouteTable {
    /// Parses route keys and rejects ambiguous tables; all problems are
    /// collected and reported together.
    pub fn try_new(
        routes: Vec<(String, RouteConfig)>,
    ) -> Result<Self, RouteConfigurationError> {
        let mut problems = Vec::new();
        let mut entries: Vec<(RoutePattern, RouteConfig)> = Vec::with_capacity(routes.len());
        for (key, config) in routes {
            match RoutePattern::from_str(&key) {
                Ok(pattern) => {
                    for (existing, _) in &entries {
                        if pattern.conflicts_with(existing) {
                            problems.push(format!(
                                "route `{}` conflicts with `{}`",
                                pattern.as_str(),
                                existing.as_str()
                            ));
                        }
                    }
                    entries.push((pattern, config));
                }
                Err(error) => problems.extend(error.problems),
            }
        }
        if !problems.is_empty() {
            return Err(RouteConfigurationError { problems });
        }
        Ok(Self { entries })
    }

    /// Finds the best-matching route for a request. Longer literal prefixes
    /// win over wildcards and parameters.
    pub fn find(&self, method: &str, path: &str) -> Option<(&RoutePattern, &RouteConfig, RouteMatch)> {
        self.entries
            .iter()
            .filter_map(|(pattern, config)| {
                pattern
                    .matches(method, path)
                    .map(|route_match| (pattern, config, route_match))
            })
            .max_by_key(|(pattern, _, _)| pattern.literal_prefix_len())
    }

    /// The route configurations, for validation against the resource server.
    pub fn configs(&self) -> Vec<RouteConfig> {
        self.entries.iter().map(|(_, config)| config.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
