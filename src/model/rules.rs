//! Security group rule specifications and their textual rule-set format.
//!
//! Rule sets are written as comma-separated entries of the form
//! `direction:protocol:ports:remote`, for example
//! `ingress:tcp:80:0.0.0.0/0,ingress:tcp:22:203.0.113.7/32`. `ports` accepts a
//! single port, an inclusive `min-max` range, or `*`. A protocol of `any` and
//! an empty remote prefix are left out of the request entirely.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Traffic direction a rule applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Inbound traffic.
    Ingress,
    /// Outbound traffic.
    Egress,
}

impl Direction {
    /// Wire representation used by the networking API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::Egress => "egress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive port range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortRange {
    /// Lowest port.
    pub min: u16,
    /// Highest port.
    pub max: u16,
}

impl PortRange {
    /// Range covering a single port.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            min: port,
            max: port,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// A single allow rule added to a security group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityRule {
    /// Traffic direction.
    pub direction: Direction,
    /// Protocol such as `tcp`, `udp` or `icmp`; `None` matches any.
    pub protocol: Option<String>,
    /// Port range; `None` matches all ports.
    pub port_range: Option<PortRange>,
    /// Source (or destination for egress) CIDR; `None` matches any.
    pub remote_ip_prefix: Option<String>,
    /// Free-form description sent with the rule.
    pub description: Option<String>,
}

impl SecurityRule {
    /// Builds an ingress TCP rule for one port.
    #[must_use]
    pub fn ingress_tcp(port: u16, remote: impl Into<String>) -> Self {
        Self {
            direction: Direction::Ingress,
            protocol: Some(String::from("tcp")),
            port_range: Some(PortRange::single(port)),
            remote_ip_prefix: Some(remote.into()),
            description: None,
        }
    }

    /// Returns a copy carrying `description`.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for SecurityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ports {} from {}",
            self.direction,
            self.protocol.as_deref().unwrap_or("any"),
            self.port_range
                .map_or_else(|| String::from("any"), |range| range.to_string()),
            self.remote_ip_prefix.as_deref().unwrap_or("any")
        )
    }
}

/// Errors raised while parsing a rule-set string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RuleParseError {
    /// Raised when an entry does not have four `:`-separated fields.
    #[error("rule `{entry}` must look like direction:protocol:ports:remote")]
    Shape {
        /// Offending entry.
        entry: String,
    },
    /// Raised for a direction other than `ingress` or `egress`.
    #[error("rule `{entry}` has unknown direction `{direction}`")]
    Direction {
        /// Offending entry.
        entry: String,
        /// Parsed direction token.
        direction: String,
    },
    /// Raised when the port field is not a port, range, or `*`.
    #[error("rule `{entry}` has invalid ports `{ports}`")]
    Ports {
        /// Offending entry.
        entry: String,
        /// Parsed ports token.
        ports: String,
    },
}

impl FromStr for SecurityRule {
    type Err = RuleParseError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let trimmed = entry.trim();
        let mut fields = trimmed.splitn(4, ':');
        let (Some(direction), Some(protocol), Some(ports), Some(remote)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(RuleParseError::Shape {
                entry: trimmed.to_owned(),
            });
        };

        let parsed_direction = match direction.trim().to_ascii_lowercase().as_str() {
            "ingress" => Direction::Ingress,
            "egress" => Direction::Egress,
            other => {
                return Err(RuleParseError::Direction {
                    entry: trimmed.to_owned(),
                    direction: other.to_owned(),
                });
            }
        };

        let port_range = parse_ports(ports.trim()).ok_or_else(|| RuleParseError::Ports {
            entry: trimmed.to_owned(),
            ports: ports.trim().to_owned(),
        })?;

        let protocol_token = protocol.trim().to_ascii_lowercase();
        let remote_token = remote.trim();

        Ok(Self {
            direction: parsed_direction,
            protocol: (!protocol_token.is_empty() && protocol_token != "any")
                .then_some(protocol_token),
            port_range,
            remote_ip_prefix: (!remote_token.is_empty()).then(|| remote_token.to_owned()),
            description: None,
        })
    }
}

/// Parses `*`/empty (all ports), `N`, or `N-M`. Returns `None` on malformed
/// input and `Some(None)` for "all ports".
fn parse_ports(token: &str) -> Option<Option<PortRange>> {
    if token.is_empty() || token == "*" {
        return Some(None);
    }
    let range = match token.split_once('-') {
        Some((min, max)) => PortRange {
            min: min.trim().parse().ok()?,
            max: max.trim().parse().ok()?,
        },
        None => PortRange::single(token.parse().ok()?),
    };
    (range.min <= range.max).then_some(Some(range))
}

/// Parses a comma-separated rule set. Empty entries are skipped and each rule
/// receives a generated description.
///
/// # Errors
///
/// Returns [`RuleParseError`] for the first malformed entry.
pub fn parse_rule_set(value: &str) -> Result<Vec<SecurityRule>, RuleParseError> {
    value
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let rule: SecurityRule = entry.parse()?;
            let description = format!("allow {rule}");
            Ok(rule.with_description(description))
        })
        .collect()
}
