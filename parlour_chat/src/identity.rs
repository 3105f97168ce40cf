use std::net::IpAddr;

/// The pair of values a client is known by for ban and rate-limit purposes.
///
/// When the transport supplies a public key the fingerprint is its SHA-256
/// digest; otherwise it is the digest of the textual remote address, so a
/// plain TCP client is effectively identified by address alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub address: String,
    pub fingerprint: String,
}

impl Identity {
    pub fn new(address: IpAddr, public_key: Option<&[u8]>) -> Self {
        let address = address.to_string();
        let fingerprint = match public_key {
            Some(key) => sha256::digest(key),
            None => sha256::digest(address.as_str()),
        };
        Self {
            address,
            fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyless_identity_hashes_address() {
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let a = Identity::new(addr, None);
        let b = Identity::new(addr, None);

        assert_eq!(a, b);
        assert_eq!(a.address, "10.0.0.1");
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn key_overrides_address() {
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let keyed = Identity::new(addr, Some(b"ssh-ed25519 AAAA"));

        assert_ne!(keyed.fingerprint, Identity::new(addr, None).fingerprint);
        assert_eq!(keyed.fingerprint, sha256::digest(&b"ssh-ed25519 AAAA"[..]));
    }
}
