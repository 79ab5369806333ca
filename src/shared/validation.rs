// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Validation of identifiers and addresses supplied by requests and inventory.
//!
//! Device ids end up in cache keys and log lines, and device addresses and
//! usernames end up in the SSH handshake, so all of them are checked against a
//! conservative character set before use.

use super::error::ValidationError;

/// Maximum length of a device, credential or proxy identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

const MAX_HOSTNAME_LENGTH: usize = 253;
const MAX_USERNAME_LENGTH: usize = 32;

/// Validate an inventory identifier (device, credential or proxy id).
///
/// # Examples
///
/// ```
/// use lookglass::shared::validation::validate_identifier;
///
/// assert!(validate_identifier("device", "edge-01.fra").is_ok());
/// assert!(validate_identifier("device", "edge 01").is_err());
/// assert!(validate_identifier("device", "").is_err());
/// ```
pub fn validate_identifier(field: &str, id: &str) -> Result<String, ValidationError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::empty(field));
    }

    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::too_long(field, MAX_IDENTIFIER_LENGTH));
    }

    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid_chars {
        return Err(ValidationError::invalid_characters(field));
    }

    Ok(id.to_string())
}

/// Validate a device or proxy management address.
///
/// Accepts DNS names and IPv4/IPv6 literals (optionally bracketed).
///
/// # Examples
///
/// ```
/// use lookglass::shared::validation::validate_hostname;
///
/// assert!(validate_hostname("core1.example.net").is_ok());
/// assert!(validate_hostname("2001:db8::1").is_ok());
/// assert!(validate_hostname("example..com").is_err());
/// assert!(validate_hostname("example.com; ls").is_err());
/// ```
pub fn validate_hostname(hostname: &str) -> Result<String, ValidationError> {
    if hostname.is_empty() {
        return Err(ValidationError::empty("address"));
    }

    if hostname.len() > MAX_HOSTNAME_LENGTH {
        return Err(ValidationError::too_long("address", MAX_HOSTNAME_LENGTH));
    }

    let valid_chars = hostname.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == ':' || c == '[' || c == ']'
    });
    if !valid_chars {
        return Err(ValidationError::invalid_characters("address"));
    }

    if hostname.contains("..") || hostname.contains("--") {
        return Err(ValidationError::new(
            "address",
            "contains suspicious repeated characters",
        ));
    }

    Ok(hostname
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string())
}

/// Validate a login username (POSIX portable character set).
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::empty("username"));
    }

    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::too_long("username", MAX_USERNAME_LENGTH));
    }

    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid_chars {
        return Err(ValidationError::invalid_characters("username"));
    }

    if username.starts_with('-') {
        return Err(ValidationError::new("username", "cannot start with a hyphen"));
    }

    Ok(username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("device", " r1 ").unwrap(), "r1");
        assert!(validate_identifier("device", "edge_01-fra.de").is_ok());

        let err = validate_identifier("device", "   ").unwrap_err();
        assert_eq!(err.field, "device");

        assert!(validate_identifier("device", "r1;reboot").is_err());
        assert!(validate_identifier("device", &"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("example.com").is_ok());
        assert!(validate_hostname("192.168.1.1").is_ok());
        assert_eq!(validate_hostname("[2001:db8::1]").unwrap(), "2001:db8::1");

        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("host name").is_err());
        assert!(validate_hostname("host--name").is_err());
        assert!(validate_hostname(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("lg-reader").is_ok());
        assert!(validate_username("svc.looking_glass").is_ok());

        assert!(validate_username("").is_err());
        assert!(validate_username("-admin").is_err());
        assert!(validate_username("user@domain").is_err());
        assert!(validate_username(&"u".repeat(33)).is_err());
    }
}
