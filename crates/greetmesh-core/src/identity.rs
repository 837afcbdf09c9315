//! Peer identity — the (name, address) pair a node publishes in the directory.

use std::fmt;

/// A node's published identity.
///
/// The name doubles as the directory key, so it must be unique across the
/// mesh. Nothing enforces that: two nodes registering the same name silently
/// overwrite each other's record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    name: String,
    address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("peer name is empty")]
    EmptyName,
    #[error("peer name {0:?} contains whitespace or '/'")]
    InvalidName(String),
    #[error("address {0:?} is not in host:port form")]
    InvalidAddress(String),
}

impl PeerIdentity {
    /// Validate and build an identity.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        let address = address.into();
        validate_name(&name)?;
        validate_address(&address)?;
        Ok(Self { name, address })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}

fn validate_name(name: &str) -> Result<(), IdentityError> {
    if name.is_empty() {
        return Err(IdentityError::EmptyName);
    }
    if name.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(IdentityError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_address(address: &str) -> Result<(), IdentityError> {
    let invalid = || IdentityError::InvalidAddress(address.to_string());
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    // Bracketed IPv6 hosts keep their colons inside the brackets.
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}
