//! Access control against a static list of client addresses.

use std::net::SocketAddr;

/// Immutable set of client addresses that receive an `OK` response.
///
/// Entries are compared by exact string equality: no normalization,
/// wildcards or CIDR ranges. Built once at startup and shared by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessList {
    allowed: Box<[String]>,
}

impl AccessList {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Decide whether `client_address` is allowed. Total: unknown, empty or
    /// malformed input is simply not allowed.
    pub fn is_allowed(&self, client_address: &str) -> bool {
        self.allowed.iter().any(|entry| entry == client_address)
    }
}

/// Client identity as seen by access control: the peer IP without its port.
pub fn client_address(peer: &SocketAddr) -> String {
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> AccessList {
        AccessList::new(["127.0.0.1", "192.168.1.100"])
    }

    #[test]
    fn exact_match_only() {
        let acl = list();
        assert!(acl.is_allowed("127.0.0.1"));
        assert!(acl.is_allowed("192.168.1.100"));

        assert!(!acl.is_allowed("10.0.0.5"));
        assert!(!acl.is_allowed("127.0.0.01"));
        assert!(!acl.is_allowed(" 127.0.0.1"));
        assert!(!acl.is_allowed("127.0.0.1:4433"));
        assert!(!acl.is_allowed("192.168.1.0/24"));
    }

    #[test]
    fn total_over_malformed_input() {
        let acl = list();
        assert!(!acl.is_allowed(""));
        assert!(!acl.is_allowed("not an address"));
        assert!(!acl.is_allowed("\u{0}"));
        assert!(!AccessList::default().is_allowed("127.0.0.1"));
    }

    #[test]
    fn pure_repeated_calls() {
        let acl = list();
        let before = acl.clone();
        for input in ["127.0.0.1", "10.0.0.5", ""] {
            assert_eq!(acl.is_allowed(input), acl.is_allowed(input));
        }
        assert_eq!(acl, before);
    }

    #[test]
    fn client_address_drops_port() {
        let v4: SocketAddr = "127.0.0.1:50123".parse().unwrap();
        let v6: SocketAddr = "[::1]:50123".parse().unwrap();
        assert_eq!(client_address(&v4), "127.0.0.1");
        assert_eq!(client_address(&v6), "::1");
    }
}
