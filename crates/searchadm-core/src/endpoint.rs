//! Remote endpoint addressing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a remote administrative server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            // IPv6 literal
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("localhost", 9312).to_string(), "localhost:9312");
        assert_eq!(Endpoint::new("::1", 9308).to_string(), "[::1]:9308");
    }

    #[test]
    fn test_endpoint_serialization() {
        let endpoint = Endpoint::new("10.0.0.5", 9312);
        let json = serde_json::to_string(&endpoint).unwrap();
        assert_eq!(json, r#"{"host":"10.0.0.5","port":9312}"#);

        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, endpoint);
    }
}
