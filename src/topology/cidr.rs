//! IPv4 CIDR value type.
//!
//! Canonical network blocks only: the address must sit on the prefix
//! boundary, so `10.0.1.0/16` is rejected rather than silently masked.
//! Serializes as the `a.b.c.d/p` string form.

use crate::core::error::PlanError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network block in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    /// Build a block from a network address and prefix length.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, PlanError> {
        if prefix > 32 {
            return Err(PlanError::InvalidCidr(format!(
                "{addr}/{prefix}: prefix length must be 0-32"
            )));
        }
        let block = Self { addr, prefix };
        if u32::from(addr) & !block.mask() != 0 {
            return Err(PlanError::InvalidCidr(format!(
                "{addr}/{prefix}: host bits set below the prefix"
            )));
        }
        Ok(block)
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    /// True when `other` is entirely inside this block.
    pub fn contains(&self, other: &Cidr) -> bool {
        self.prefix <= other.prefix && (u32::from(other.addr) & self.mask()) == u32::from(self.addr)
    }

    /// True when the two blocks share any address. With canonical blocks
    /// this reduces to one containing the other.
    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, prefix_str) = s
            .split_once('/')
            .ok_or_else(|| PlanError::InvalidCidr(format!("{s}: expected a.b.c.d/p")))?;
        let addr = Ipv4Addr::from_str(addr_str)
            .map_err(|_| PlanError::InvalidCidr(format!("{s}: bad IPv4 address")))?;
        let prefix = prefix_str
            .parse::<u8>()
            .map_err(|_| PlanError::InvalidCidr(format!("{s}: bad prefix length")))?;
        Self::new(addr, prefix)
    }
}

impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: PlanError| D::Error::custom(e.to_string()))
    }
}
