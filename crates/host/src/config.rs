//! Configuration

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use mytree_merkle::{Field, PublicKey};

/// A public key registered at startup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Leaf index
    pub index: u64,
    /// Registered key
    pub key: PublicKey,
}

impl FromStr for Member {
    type Err = anyhow::Error;

    /// Parses `index:x[:parity]`
    fn from_str(s: &str) -> Result<Self> {
        let (index, key) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("member must be index:x[:parity], got {}", s))?;
        Ok(Self {
            index: index.trim().parse().context("invalid member index")?,
            key: key.trim().parse()?,
        })
    }
}

/// Host configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// RPC listen address
    pub rpc_addr: String,
    /// Submit `initState` with the mirror root on startup
    pub auto_init: bool,
    /// Max events returned per query
    pub event_page_size: usize,
    /// Keys registered through `addAddress` after init
    pub members: Vec<Member>,
    /// Sender used for administrative calls
    pub operator: PublicKey,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_addr: "0.0.0.0:8547".to_string(),
            auto_init: true,
            event_page_size: 100,
            members: Vec::new(),
            operator: PublicKey::new(Field::ZERO, false),
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let members = match env::var("MEMBERS") {
            Ok(list) => Self::parse_members(&list)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            rpc_addr: env::var("RPC_ADDR").unwrap_or(defaults.rpc_addr),
            auto_init: env::var("AUTO_INIT")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.auto_init),
            event_page_size: env::var("EVENT_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_page_size),
            members,
            operator: match env::var("OPERATOR") {
                Ok(key) => key.parse().context("invalid OPERATOR key")?,
                Err(_) => defaults.operator,
            },
        })
    }

    /// Parse a comma-separated member list
    pub fn parse_members(list: &str) -> Result<Vec<Member>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Member::from_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members() {
        let members = Config::parse_members("3:0xa11ce:1, 7:42").unwrap();
        assert_eq!(
            members,
            vec![
                Member {
                    index: 3,
                    key: PublicKey::new(Field::from_u64(0xa11ce), true)
                },
                Member {
                    index: 7,
                    key: PublicKey::new(Field::from_u64(42), false)
                },
            ]
        );
        assert!(Config::parse_members("").unwrap().is_empty());
        assert!(Config::parse_members("x:1").is_err());
        assert!(Config::parse_members("1").is_err());
    }
}
