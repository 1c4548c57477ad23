//! IP family tag shared by pools, labels and status slots.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label carrying the IP family of a pool we created.
pub const IP_FAMILY_LABEL: &str = "infrastructure.microscaler.io/ip-family";

/// IPv4 or IPv6 address space.
///
/// The declaration order is the status slot order: v4 always precedes v6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Families in slot order.
    pub const ALL: [IpFamily; 2] = [IpFamily::V4, IpFamily::V6];

    pub fn as_str(self) -> &'static str {
        match self {
            IpFamily::V4 => "v4",
            IpFamily::V6 => "v6",
        }
    }

    /// Largest prefix length valid for this family.
    pub fn max_prefix(self) -> u8 {
        match self {
            IpFamily::V4 => 32,
            IpFamily::V6 => 128,
        }
    }

    pub fn of(addr: &std::net::IpAddr) -> Self {
        if addr.is_ipv4() { IpFamily::V4 } else { IpFamily::V6 }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
