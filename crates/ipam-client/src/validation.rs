//! IP configuration validation
//!
//! Runs before any pool is created. A failure here is permanent for the
//! current spec: retrying cannot fix a malformed range.

use crate::error::IpamError;
use crds::{IPConfigSpec, IpFamily};
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::str::FromStr;

/// Validates one family's configuration.
///
/// Stricter than a plain parse: an address entry whose prefix exceeds the
/// family width (such as `10.10.10.192/64`) is rejected, and so is a
/// gateway of the other family.
pub fn validate_ip_config(family: IpFamily, config: &IPConfigSpec) -> Result<(), IpamError> {
    if config.addresses.is_empty() {
        return Err(IpamError::Validation(format!("{} config has no addresses", family)));
    }

    if config.prefix > family.max_prefix() {
        return Err(IpamError::Validation(format!(
            "{} prefix {} exceeds {}",
            family,
            config.prefix,
            family.max_prefix()
        )));
    }

    let gateway = IpAddr::from_str(config.gateway.trim())
        .map_err(|_| IpamError::Validation(format!("invalid gateway '{}'", config.gateway)))?;
    if IpFamily::of(&gateway) != family {
        return Err(IpamError::Validation(format!(
            "gateway {} is not an {} address",
            gateway, family
        )));
    }

    for entry in &config.addresses {
        let entry_family = parse_address_entry(entry)?;
        if entry_family != family {
            return Err(IpamError::Validation(format!(
                "address '{}' is not in the {} family",
                entry, family
            )));
        }
    }

    Ok(())
}

/// Parses a CIDR, a `start-end` range or a single address and returns its family.
fn parse_address_entry(entry: &str) -> Result<IpFamily, IpamError> {
    let entry = entry.trim();
    if entry.contains('/') {
        let network = IpNetwork::from_str(entry)
            .map_err(|e| IpamError::Validation(format!("invalid CIDR '{}': {}", entry, e)))?;
        return Ok(IpFamily::of(&network.ip()));
    }

    if let Some((start, end)) = entry.split_once('-') {
        let start = parse_addr(start, entry)?;
        let end = parse_addr(end, entry)?;
        if IpFamily::of(&start) != IpFamily::of(&end) {
            return Err(IpamError::Validation(format!("range '{}' mixes IP families", entry)));
        }
        if start > end {
            return Err(IpamError::Validation(format!("range '{}' starts after it ends", entry)));
        }
        return Ok(IpFamily::of(&start));
    }

    parse_addr(entry, entry).map(|addr| IpFamily::of(&addr))
}

fn parse_addr(value: &str, entry: &str) -> Result<IpAddr, IpamError> {
    IpAddr::from_str(value.trim())
        .map_err(|_| IpamError::Validation(format!("invalid address '{}' in '{}'", value.trim(), entry)))
}
