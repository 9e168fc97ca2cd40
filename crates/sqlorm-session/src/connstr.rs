//! Connection strings.
//!
//! A connection string is a whitespace separated list of `key=value`
//! pairs. Values may not contain spaces.
//!
//! ```ignore
//! let cs: ConnectionString = "adapter=pgsql db=shop user=ann pool=2,8".parse()?;
//! assert_eq!(cs.adapter(), AdapterKind::Pgsql);
//! assert_eq!(cs.pool(), Some("2,8"));
//! assert_eq!(cs.params().get("db"), Some("shop"));
//! ```
//!
//! `adapter` is required, `pool` selects a pooled datasource and `debug`
//! (with any value) logs statements at `info` level. Every other keyword is
//! handed to the adapter.

use std::str::FromStr;

use sqlorm_core::{ConnectParams, Error, Result};

use crate::adapter::AdapterKind;
use crate::config::DatasourceConfig;

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    adapter: AdapterKind,
    pool: Option<String>,
    debug: bool,
    params: ConnectParams,
}

impl ConnectionString {
    pub fn parse(text: &str) -> Result<Self> {
        let illegal = |why: &str| Error::IllegalConnectionString(format!("{text} ({why})"));

        let mut params = ConnectParams::new();
        for part in text.split_whitespace() {
            let mut pieces = part.split('=');
            let (Some(key), Some(value), None) = (pieces.next(), pieces.next(), pieces.next())
            else {
                return Err(illegal(&format!("{part:?} is not a key=value pair")));
            };
            if key.is_empty() || value.is_empty() {
                return Err(illegal(&format!("{part:?} has an empty key or value")));
            }
            params.insert(key, value);
        }

        let adapter: AdapterKind = params
            .remove("adapter")
            .ok_or_else(|| illegal("The adapter= keyword must always be present!"))?
            .parse()?;
        let pool = params.remove("pool");
        if pool.is_some() && !adapter.supports_pool() {
            return Err(Error::NoPoolForAdapter(adapter.to_string()));
        }
        let debug = params.remove("debug").is_some();

        let debug_flag = debug;
        tracing::debug!(adapter = %adapter, pooled = pool.is_some(), debug = debug_flag, "Parsed connection string");
        Ok(Self {
            adapter,
            pool,
            debug,
            params,
        })
    }

    pub fn adapter(&self) -> AdapterKind {
        self.adapter
    }

    /// The raw `pool=` value.
    pub fn pool(&self) -> Option<&str> {
        self.pool.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Keywords for the adapter, without `adapter`, `pool` and `debug`.
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    pub fn into_params(self) -> ConnectParams {
        self.params
    }

    /// Datasource configuration implied by the string.
    pub fn config(&self) -> DatasourceConfig {
        DatasourceConfig::new().debug(self.debug)
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cs = ConnectionString::parse("adapter=mysql  db=shop\tuser=ann debug=1").unwrap();
        assert_eq!(cs.adapter(), AdapterKind::Mysql);
        assert!(cs.debug());
        assert!(cs.config().debug);
        assert_eq!(cs.pool(), None);
        assert_eq!(cs.params().get("db"), Some("shop"));
        assert_eq!(cs.params().get("user"), Some("ann"));
        assert_eq!(cs.params().len(), 2);
    }

    #[test]
    fn test_adapter_is_required() {
        let err = ConnectionString::parse("db=shop").unwrap_err();
        assert!(matches!(err, Error::IllegalConnectionString(_)));
        assert!(err.to_string().contains("The adapter= keyword must always be present!"));
    }

    #[test]
    fn test_malformed_pairs() {
        for text in ["adapter=pgsql db=", "adapter=pgsql =shop", "adapter=pgsql shop", "adapter=pgsql a=b=c"] {
            assert!(
                matches!(ConnectionString::parse(text), Err(Error::IllegalConnectionString(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_unknown_adapter() {
        assert!(matches!(
            ConnectionString::parse("adapter=oracle"),
            Err(Error::UnknownAdapter(_))
        ));
    }

    #[test]
    fn test_pool_only_for_postgres() {
        let cs: ConnectionString = "adapter=pgsql pool=2,4".parse().unwrap();
        assert_eq!(cs.pool(), Some("2,4"));
        assert!(!cs.params().contains("pool"));
        assert!(matches!(
            ConnectionString::parse("adapter=mysql pool=2,4"),
            Err(Error::NoPoolForAdapter(name)) if name == "mysql"
        ));
    }
}
