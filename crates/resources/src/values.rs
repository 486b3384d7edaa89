//! Enumerated value sets accepted in candidate fields
//!
//! Candidates carry these as plain strings so that an unknown value can be
//! reported as a validation failure rather than a decode failure. Parsing is
//! case-insensitive and treats `-` and `_` alike, so `round-robin` and
//! `ROUND_ROBIN` name the same algorithm.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string that is not a member of a value set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not one of: {allowed}")]
pub struct UnknownValue {
    pub value: String,
    pub allowed: String,
}

fn fold(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace('_', "-")
}

macro_rules! value_set {
    ($(#[$attr:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical spelling, as stored by the backend
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let folded = fold(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| fold(v.as_str()) == folded)
                    .ok_or_else(|| UnknownValue {
                        value: s.to_string(),
                        allowed: $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

value_set!(
    /// Traffic direction of a security rule
    Direction {
        Ingress => "ingress",
        Egress => "egress",
    }
);

value_set!(
    /// Protocol matched by a security rule
    RuleProtocol {
        Tcp => "tcp",
        Udp => "udp",
        Icmp => "icmp",
        Any => "any",
    }
);

impl RuleProtocol {
    /// Whether the rule's port fields are a port range (as opposed to ICMP type/code)
    pub fn has_ports(&self) -> bool {
        matches!(self, RuleProtocol::Tcp | RuleProtocol::Udp)
    }
}

value_set!(
    EtherType {
        Ipv4 => "IPv4",
        Ipv6 => "IPv6",
    }
);

value_set!(
    /// Load balancing algorithm
    LbAlgorithm {
        RoundRobin => "ROUND_ROBIN",
        LeastConnections => "LEAST_CONNECTIONS",
        SourceIp => "SOURCE_IP",
    }
);

value_set!(
    /// Protocol balanced by a pool or served by a listener
    LbProtocol {
        Http => "HTTP",
        Https => "HTTPS",
        Tcp => "TCP",
    }
);

value_set!(
    /// Health monitor probe type
    MonitorType {
        Ping => "PING",
        Tcp => "TCP",
        Http => "HTTP",
        Https => "HTTPS",
    }
);

impl MonitorType {
    pub fn is_http(&self) -> bool {
        matches!(self, MonitorType::Http | MonitorType::Https)
    }
}
