use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Port(u16);

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Port must be between 1 and 65535, got: {0}")]
    OutOfRange(u16),
}

impl Port {
    /// Standard DNS-over-TLS port.
    pub const DOT: Port = Port(853);

    /// Default listen port of the local DoH proxy.
    pub const DOH_PROXY: Port = Port(5053);

    pub fn new(port: u16) -> Result<Self, PortError> {
        if port == 0 {
            return Err(PortError::OutOfRange(port));
        }
        Ok(Self(port))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Port {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Port {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let port = u16::deserialize(deserializer)?;
        Port::new(port).map_err(serde::de::Error::custom)
    }
}
