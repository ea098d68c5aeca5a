use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::DecodeError;

/// A network address as stored in measurement records.
///
/// Addresses hash and compare by value, which is what the per-record
/// interning tables key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Addr {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Ethernet([u8; 6]),
    Firewire([u8; 8]),
}

impl Addr {
    pub const TYPE_IPV4: u8 = 1;
    pub const TYPE_IPV6: u8 = 2;
    pub const TYPE_ETHERNET: u8 = 3;
    pub const TYPE_FIREWIRE: u8 = 4;

    /// On-disk type code.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            Addr::V4(_) => Self::TYPE_IPV4,
            Addr::V6(_) => Self::TYPE_IPV6,
            Addr::Ethernet(_) => Self::TYPE_ETHERNET,
            Addr::Firewire(_) => Self::TYPE_FIREWIRE,
        }
    }

    /// Number of raw address bytes.
    #[must_use]
    pub fn octet_len(&self) -> usize {
        match self {
            Addr::V4(_) => 4,
            Addr::V6(_) => 16,
            Addr::Ethernet(_) => 6,
            Addr::Firewire(_) => 8,
        }
    }

    /// Size of the literal `[len][type][bytes]` form.
    #[must_use]
    pub fn literal_size(&self) -> usize {
        2 + self.octet_len()
    }

    #[must_use]
    pub fn is_ipv4(&self) -> bool {
        matches!(self, Addr::V4(_))
    }

    #[must_use]
    pub fn is_ipv6(&self) -> bool {
        matches!(self, Addr::V6(_))
    }

    /// Raw address bytes in network order.
    #[must_use]
    pub fn octets(&self) -> Vec<u8> {
        match self {
            Addr::V4(a) => a.octets().to_vec(),
            Addr::V6(a) => a.octets().to_vec(),
            Addr::Ethernet(a) => a.to_vec(),
            Addr::Firewire(a) => a.to_vec(),
        }
    }

    /// Builds an address from its type code and raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] if the type code is unknown or the
    /// byte count does not match the type.
    pub fn from_parts(type_code: u8, bytes: &[u8]) -> Result<Self, DecodeError> {
        let addr = match (type_code, bytes.len()) {
            (Self::TYPE_IPV4, 4) => {
                Addr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
            }
            (Self::TYPE_IPV6, 16) => {
                let mut o = [0u8; 16];
                o.copy_from_slice(bytes);
                Addr::V6(Ipv6Addr::from(o))
            }
            (Self::TYPE_ETHERNET, 6) => {
                let mut o = [0u8; 6];
                o.copy_from_slice(bytes);
                Addr::Ethernet(o)
            }
            (Self::TYPE_FIREWIRE, 8) => {
                let mut o = [0u8; 8];
                o.copy_from_slice(bytes);
                Addr::Firewire(o)
            }
            (1..=4, _) => {
                return Err(DecodeError::Malformed("address length for its type"))
            }
            _ => return Err(DecodeError::Malformed("address type")),
        };
        Ok(addr)
    }
}

impl From<Ipv4Addr> for Addr {
    fn from(a: Ipv4Addr) -> Self {
        Addr::V4(a)
    }
}

impl From<Ipv6Addr> for Addr {
    fn from(a: Ipv6Addr) -> Self {
        Addr::V6(a)
    }
}

impl From<IpAddr> for Addr {
    fn from(a: IpAddr) -> Self {
        match a {
            IpAddr::V4(v4) => Addr::V4(v4),
            IpAddr::V6(v6) => Addr::V6(v6),
        }
    }
}

fn write_hw(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(":")?;
        }
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addr::V4(a) => a.fmt(f),
            Addr::V6(a) => a.fmt(f),
            Addr::Ethernet(a) => write_hw(f, a),
            Addr::Firewire(a) => write_hw(f, a),
        }
    }
}
