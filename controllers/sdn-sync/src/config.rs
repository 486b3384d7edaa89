//! Controller configuration, read from environment variables.

use crate::backoff::RetryPolicy;
use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub sdn_url: String,
    pub sdn_token: String,
    /// Root of every fully-qualified name
    pub domain: String,
    pub listen_addr: SocketAddr,
    /// Parent project lookups, tolerating propagation delay in the backend
    pub parent_wait: RetryPolicy,
    /// Optimistic read-modify-write attempts on version conflict
    pub commit_retry: RetryPolicy,
    /// Wait for a per-identifier lease before giving up with a conflict
    pub lease_wait: Duration,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sdn_url = lookup("SDN_API_URL").unwrap_or_else(|| "http://127.0.0.1:8082".to_string());
        let sdn_token = lookup("SDN_API_TOKEN").ok_or_else(|| {
            ControllerError::InvalidConfig("SDN_API_TOKEN environment variable is required".to_string())
        })?;
        let domain = lookup("SDN_DOMAIN").unwrap_or_else(|| "default-domain".to_string());
        let listen_addr = parse(&lookup, "LISTEN_ADDR", "0.0.0.0:8080".parse::<SocketAddr>())?;

        let attempts: u32 = parse(&lookup, "PARENT_WAIT_ATTEMPTS", Ok(2))?;
        let initial_ms: u64 = parse(&lookup, "PARENT_WAIT_INITIAL_MS", Ok(3000))?;
        let max_ms: u64 = parse(&lookup, "PARENT_WAIT_MAX_MS", Ok(12000))?;
        let commit_attempts: u32 = parse(&lookup, "COMMIT_RETRY_ATTEMPTS", Ok(3))?;
        let lease_ms: u64 = parse(&lookup, "LEASE_WAIT_MS", Ok(5000))?;

        if attempts == 0 || commit_attempts == 0 {
            return Err(ControllerError::InvalidConfig(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        if max_ms < initial_ms {
            return Err(ControllerError::InvalidConfig(format!(
                "PARENT_WAIT_MAX_MS ({}) is below PARENT_WAIT_INITIAL_MS ({})",
                max_ms, initial_ms
            )));
        }

        Ok(Self {
            sdn_url,
            sdn_token,
            domain,
            listen_addr,
            parent_wait: RetryPolicy::new(
                attempts,
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
            ),
            commit_retry: RetryPolicy::new(commit_attempts, Duration::from_millis(50), Duration::from_millis(400)),
            lease_wait: Duration::from_millis(lease_ms),
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: Result<T, T::Err>) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = match lookup(key) {
        Some(raw) => raw.trim().parse::<T>(),
        None => default,
    };
    parsed.map_err(|e| ControllerError::InvalidConfig(format!("{}: {}", key, e)))
}
