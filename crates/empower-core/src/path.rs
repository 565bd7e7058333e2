//! Channel ids and id patterns.
//!
//! A channel's full id is `"{thing_id}.{channel_id}"` where the thing id is
//! itself `"{type}.{instance}"`, e.g. `"battery.2.voltage"`. Patterns select
//! full ids from the mobile projection with `*` wildcards.
//!
//! Matching is segment-based, without regex.

/// A parsed full channel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelPath {
    raw: String,
    thing_len: usize,
}

impl ChannelPath {
    /// Join a thing id and a channel id.
    pub fn new(thing_id: &str, channel_id: &str) -> Self {
        Self {
            raw: format!("{}.{}", thing_id, channel_id),
            thing_len: thing_id.len(),
        }
    }

    /// Split a full id. The thing id is the first two segments.
    pub fn parse(full_id: &str) -> Result<Self, PatternError> {
        let mut dots = full_id.match_indices('.').map(|(i, _)| i);
        let _type_end = dots.next().ok_or(PatternError::NotAChannelId)?;
        let thing_end = dots.next().ok_or(PatternError::NotAChannelId)?;
        if thing_end + 1 >= full_id.len() {
            return Err(PatternError::NotAChannelId);
        }
        Ok(Self {
            raw: full_id.to_string(),
            thing_len: thing_end,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn thing_id(&self) -> &str {
        &self.raw[..self.thing_len]
    }

    pub fn channel_id(&self) -> &str {
        &self.raw[self.thing_len + 1..]
    }
}

impl std::fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A segment in an id pattern.
#[derive(Debug, Clone, PartialEq)]
enum PatternSegment {
    Literal(String),
    /// Matches exactly one segment mid-pattern, or any suffix at the end.
    Wildcard,
}

/// A pattern over dot-separated ids.
///
/// - Exact: `"battery.2.voltage"`
/// - Suffix wildcard: `"battery.*"`
/// - Mid-path wildcard: `"tank.*.level"`
/// - Full wildcard: `"*"`
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
    trailing_wildcard: bool,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let parts: Vec<&str> = pattern.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(PatternError::EmptySegment(pattern.to_string()));
        }

        let segments = parts
            .iter()
            .map(|&s| {
                if s == "*" {
                    PatternSegment::Wildcard
                } else {
                    PatternSegment::Literal(s.to_string())
                }
            })
            .collect();

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            trailing_wildcard: parts.last() == Some(&"*"),
        })
    }

    /// Check if an id matches this pattern.
    pub fn matches(&self, id: &str) -> bool {
        let parts: Vec<&str> = id.split('.').collect();

        if self.trailing_wildcard {
            // the trailing `*` must cover at least one segment
            if parts.len() < self.segments.len() {
                return false;
            }
        } else if parts.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(parts.iter())
            .all(|(segment, part)| match segment {
                PatternSegment::Literal(lit) => lit == part,
                PatternSegment::Wildcard => !part.is_empty(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Errors that can occur when parsing ids or patterns.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Empty pattern")]
    EmptyPattern,

    #[error("Pattern {0:?} has an empty segment")]
    EmptySegment(String),

    #[error("Not a full channel id")]
    NotAChannelId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_path_parts() {
        let path = ChannelPath::new("battery.2", "voltage");
        assert_eq!(path.as_str(), "battery.2.voltage");
        assert_eq!(path.thing_id(), "battery.2");
        assert_eq!(path.channel_id(), "voltage");
    }

    #[test]
    fn test_channel_path_parse() {
        let path = ChannelPath::parse("shorePower.0.line1Voltage").unwrap();
        assert_eq!(path.thing_id(), "shorePower.0");
        assert_eq!(path.channel_id(), "line1Voltage");

        assert_eq!(ChannelPath::parse("battery.2"), Err(PatternError::NotAChannelId));
        assert_eq!(ChannelPath::parse("battery.2."), Err(PatternError::NotAChannelId));
    }

    #[test]
    fn test_exact_pattern() {
        let pattern = PathPattern::new("battery.2.voltage").unwrap();
        assert!(pattern.matches("battery.2.voltage"));
        assert!(!pattern.matches("battery.2.current"));
        assert!(!pattern.matches("battery.2"));
    }

    #[test]
    fn test_suffix_wildcard() {
        let pattern = PathPattern::new("battery.*").unwrap();
        assert!(pattern.matches("battery.2.voltage"));
        assert!(pattern.matches("battery.0.stateOfCharge"));
        assert!(!pattern.matches("battery"));
        assert!(!pattern.matches("tank.1.level"));
    }

    #[test]
    fn test_mid_path_wildcard() {
        let pattern = PathPattern::new("tank.*.level").unwrap();
        assert!(pattern.matches("tank.0.level"));
        assert!(pattern.matches("tank.7.level"));
        assert!(!pattern.matches("tank.0.volume"));
        assert!(!pattern.matches("tank.level"));
    }

    #[test]
    fn test_full_wildcard() {
        let pattern = PathPattern::new("*").unwrap();
        assert!(pattern.matches("battery.2.voltage"));
        assert!(pattern.matches("x"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(PathPattern::new(""), Err(PatternError::EmptyPattern)));
        assert!(matches!(
            PathPattern::new("battery..voltage"),
            Err(PatternError::EmptySegment(_))
        ));
    }
}
