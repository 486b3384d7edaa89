//! Load balancer resource policies
//!
//! Handles: Pool, Member (child of its pool), HealthMonitor, Listener

pub mod health_monitor;
pub mod listener;
pub mod member;
pub mod pool;

#[cfg(test)]
mod pool_test;

pub use health_monitor::HealthMonitorPolicy;
pub use listener::ListenerPolicy;
pub use member::MemberPolicy;
pub use pool::PoolPolicy;

use crate::sync_error::SyncError;
use crate::validator::{require, require_range};

/// A TCP/UDP port number that must be present
fn require_port(field: &str, value: &Option<u32>) -> Result<u16, SyncError> {
    let port = require_range(field, *require(field, value)?, 1, u32::from(u16::MAX))?;
    u16::try_from(port).map_err(|_| SyncError::range(field, format!("{} is not a port number", port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_port() {
        assert_eq!(require_port("protocolPort", &Some(443)).unwrap(), 443);
        assert!(matches!(require_port("protocolPort", &None), Err(SyncError::MissingField(_))));
        assert!(matches!(
            require_port("protocolPort", &Some(0)),
            Err(SyncError::RangeViolation { .. })
        ));
        assert!(require_port("protocolPort", &Some(65536)).is_err());
    }
}
