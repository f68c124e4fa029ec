//! # Identity
//!
//! Routing addresses derived from a public key and an identifier.
//!
//! ```text
//! address            = identifier "." hex(publicKey)   | hex(publicKey)
//! subclient address  = "__" index "__." address
//! ```

use serde::{Deserialize, Serialize};

/// Index used for the original (unprefixed) subclient.
pub const ORIGINAL_CLIENT_INDEX: i32 = -1;

/// A client identity. Immutable once derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    public_key: Vec<u8>,
    identifier: String,
    address: String,
}

impl Identity {
    /// Derive the identity for `public_key` under `identifier`.
    #[must_use]
    pub fn derive(public_key: &[u8], identifier: &str) -> Self {
        Self {
            public_key: public_key.to_vec(),
            identifier: identifier.to_string(),
            address: make_address(identifier, &hex::encode(public_key)),
        }
    }

    /// Public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Hex-encoded public key.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    /// Identifier (possibly empty).
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Routing address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Identity of subclient `index` under this identity.
    #[must_use]
    pub fn subclient(&self, index: i32) -> Self {
        Self::derive(&self.public_key, &subclient_identifier(&self.identifier, index))
    }
}

/// Join an identifier and a hex public key into an address.
#[must_use]
pub fn make_address(identifier: &str, public_key_hex: &str) -> String {
    if identifier.is_empty() {
        public_key_hex.to_string()
    } else {
        format!("{identifier}.{public_key_hex}")
    }
}

/// Identifier used by subclient `index` for base identifier `base`.
#[must_use]
pub fn subclient_identifier(base: &str, index: i32) -> String {
    if index < 0 {
        return base.to_string();
    }
    let prefix = format!("__{index}__");
    if base.is_empty() {
        prefix
    } else {
        format!("{prefix}.{base}")
    }
}

/// Address of subclient `index` of the client at `address`.
#[must_use]
pub fn add_identifier(address: &str, index: i32) -> String {
    if index < 0 {
        address.to_string()
    } else {
        format!("__{index}__.{address}")
    }
}

/// Strip a subclient prefix, returning the client address and the index.
#[must_use]
pub fn remove_identifier(address: &str) -> (String, Option<i32>) {
    let Some(rest) = address.strip_prefix("__") else {
        return (address.to_string(), None);
    };
    let Some((index, tail)) = rest.split_once("__") else {
        return (address.to_string(), None);
    };
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return (address.to_string(), None);
    }
    let Ok(index) = index.parse::<i32>() else {
        return (address.to_string(), None);
    };
    match tail.strip_prefix('.') {
        Some(base) => (base.to_string(), Some(index)),
        None if tail.is_empty() => (String::new(), Some(index)),
        None => (address.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_address_without_identifier_is_hex_key() {
        let id = Identity::derive(&[0xab, 0xcd], "");
        assert_eq!(id.address(), "abcd");
    }

    #[test]
    fn test_address_with_identifier() {
        let id = Identity::derive(&[0xab, 0xcd], "alice");
        assert_eq!(id.address(), "alice.abcd");
    }

    #[test]
    fn test_subclient_address() {
        let id = Identity::derive(&[0x01], "alice");
        assert_eq!(id.subclient(0).address(), "__0__.alice.01");
        assert_eq!(id.subclient(ORIGINAL_CLIENT_INDEX).address(), "alice.01");

        let bare = Identity::derive(&[0x01], "");
        assert_eq!(bare.subclient(2).address(), "__2__.01");
    }

    #[test]
    fn test_remove_identifier() {
        assert_eq!(
            remove_identifier("__3__.alice.01"),
            ("alice.01".to_string(), Some(3))
        );
        assert_eq!(remove_identifier("alice.01"), ("alice.01".to_string(), None));
        assert_eq!(remove_identifier("__x__.01"), ("__x__.01".to_string(), None));
    }

    proptest! {
        #[test]
        fn test_add_then_remove_identifier(index in 0i32..64, key in proptest::collection::vec(any::<u8>(), 1..33)) {
            let address = hex::encode(&key);
            let prefixed = add_identifier(&address, index);
            prop_assert_eq!(remove_identifier(&prefixed), (address, Some(index)));
        }

        #[test]
        fn test_subclient_identity_matches_prefixed_address(index in 0i32..16, ident in "[a-z]{0,8}") {
            let id = Identity::derive(&[7, 7, 7], &ident);
            let sub = id.subclient(index);
            let expected = add_identifier(id.address(), index);
            prop_assert_eq!(sub.address(), expected.as_str());
        }
    }
}
