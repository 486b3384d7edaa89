//! Address arithmetic for subnets, fixed IPs and floating IPs

use crate::sync_error::SyncError;
use ipnetwork::IpNetwork;
use sdn_client::IpamSubnet;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Upper bound on addresses scanned per allocation range
const MAX_SCAN: usize = 1 << 16;

pub fn parse_cidr(field: &str, raw: &str) -> Result<IpNetwork, SyncError> {
    let network: IpNetwork = raw
        .parse()
        .map_err(|e| SyncError::malformed(field, format!("'{}' is not a CIDR: {}", raw, e)))?;
    if network.ip() != network.network() {
        return Err(SyncError::malformed(
            field,
            format!("'{}' has host bits set (network is {})", raw, network.network()),
        ));
    }
    Ok(network)
}

pub fn parse_ip(field: &str, raw: &str) -> Result<IpAddr, SyncError> {
    raw.parse()
        .map_err(|_| SyncError::malformed(field, format!("'{}' is not an IP address", raw)))
}

/// The subnet's prefix as a network
pub fn subnet_network(subnet: &IpamSubnet) -> Result<IpNetwork, SyncError> {
    parse_cidr("cidr", &subnet.cidr())
}

pub fn require_in_cidr(field: &str, address: IpAddr, network: &IpNetwork) -> Result<(), SyncError> {
    if network.contains(address) {
        Ok(())
    } else {
        Err(SyncError::range(field, format!("{} is outside {}", address, network)))
    }
}

/// True if the two prefixes share any address
pub fn overlaps(a: &IpNetwork, b: &IpNetwork) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Rejects `candidate` if it overlaps any of `existing`
pub fn require_disjoint<'a>(
    candidate: &IpNetwork,
    existing: impl IntoIterator<Item = &'a IpamSubnet>,
) -> Result<(), SyncError> {
    for subnet in existing {
        let other = subnet_network(subnet)?;
        if overlaps(candidate, &other) {
            return Err(SyncError::InvalidCombination(format!(
                "{} overlaps subnet {} ({})",
                candidate, subnet.subnet_uuid, other
            )));
        }
    }
    Ok(())
}

/// Validates an inclusive allocation range inside `network`
pub fn require_range_in_cidr(start: &str, end: &str, network: &IpNetwork) -> Result<(IpAddr, IpAddr), SyncError> {
    let first = parse_ip("allocationPools.start", start)?;
    let last = parse_ip("allocationPools.end", end)?;
    require_in_cidr("allocationPools.start", first, network)?;
    require_in_cidr("allocationPools.end", last, network)?;
    if first > last {
        return Err(SyncError::range(
            "allocationPools",
            format!("start {} is after end {}", first, last),
        ));
    }
    Ok((first, last))
}

/// Last address of `network` (the IPv4 broadcast address)
fn last_address(network: &IpNetwork) -> IpAddr {
    match network {
        IpNetwork::V4(v4) => {
            let host_bits = u32::MAX.checked_shr(u32::from(v4.prefix())).unwrap_or(0);
            IpAddr::V4(Ipv4Addr::from(u32::from(v4.network()) | host_bits))
        }
        IpNetwork::V6(v6) => {
            let host_bits = u128::MAX.checked_shr(u32::from(v6.prefix())).unwrap_or(0);
            IpAddr::V6(Ipv6Addr::from(u128::from(v6.network()) | host_bits))
        }
    }
}

fn successor(ip: IpAddr) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(v4) => u32::from(v4).checked_add(1).map(|n| IpAddr::V4(Ipv4Addr::from(n))),
        IpAddr::V6(v6) => u128::from(v6).checked_add(1).map(|n| IpAddr::V6(Ipv6Addr::from(n))),
    }
}

/// Addresses `first..=last`, at most `MAX_SCAN` of them
fn span(first: IpAddr, last: IpAddr) -> impl Iterator<Item = IpAddr> {
    std::iter::successors(Some(first), move |ip| successor(*ip).filter(|next| *next <= last))
        .take(MAX_SCAN)
}

/// First free address of `subnet`, honouring its allocation pools and gateway.
///
/// Each allocation pool is scanned from its own start; without pools the
/// whole prefix is. The network address and the IPv4 broadcast address are
/// never handed out.
pub fn allocate(subnet: &IpamSubnet, used: &HashSet<IpAddr>) -> Result<Option<IpAddr>, SyncError> {
    let network = subnet_network(subnet)?;
    let gateway = subnet
        .default_gateway
        .as_deref()
        .map(|g| parse_ip("gatewayIp", g))
        .transpose()?;

    let mut ranges = Vec::new();
    for pool in &subnet.allocation_pools {
        ranges.push(require_range_in_cidr(&pool.start, &pool.end, &network)?);
    }
    if ranges.is_empty() {
        ranges.push((network.network(), last_address(&network)));
    }

    let reserved = |ip: &IpAddr| {
        *ip == network.network()
            || (network.is_ipv4() && *ip == last_address(&network))
            || Some(*ip) == gateway
            || used.contains(ip)
    };
    let found = ranges
        .into_iter()
        .find_map(|(first, last)| span(first, last).find(|ip| !reserved(ip)));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_client::{AllocationPool, mock::Fixtures};

    fn subnet(cidr: &str, gateway: Option<&str>) -> IpamSubnet {
        Fixtures::new("default-domain").subnet("s1", cidr, gateway)
    }

    #[test]
    fn test_parse_cidr_rejects_host_bits() {
        assert!(parse_cidr("cidr", "10.0.0.0/24").is_ok());
        assert!(parse_cidr("cidr", "10.0.0.1/24").is_err());
        assert!(parse_cidr("cidr", "10.0.0.0/33").is_err());
        assert!(parse_cidr("cidr", "fd00::/64").is_ok());
    }

    #[test]
    fn test_overlap_detection() {
        let a = parse_cidr("cidr", "10.0.0.0/16").unwrap();
        let b = parse_cidr("cidr", "10.0.4.0/24").unwrap();
        let c = parse_cidr("cidr", "10.1.0.0/24").unwrap();
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
        assert!(!overlaps(&a, &c));

        let existing = [subnet("10.0.4.0/24", None)];
        assert!(require_disjoint(&a, &existing).is_err());
        assert!(require_disjoint(&c, &existing).is_ok());
    }

    #[test]
    fn test_allocate_skips_gateway_and_used() {
        let s = subnet("10.0.0.0/29", Some("10.0.0.1"));
        let mut used = HashSet::new();
        assert_eq!(allocate(&s, &used).unwrap(), Some("10.0.0.2".parse().unwrap()));

        used.insert("10.0.0.2".parse().unwrap());
        assert_eq!(allocate(&s, &used).unwrap(), Some("10.0.0.3".parse().unwrap()));

        // .3 - .6 are the remaining hosts; .7 is broadcast
        for host in 3..=6 {
            used.insert(format!("10.0.0.{}", host).parse().unwrap());
        }
        assert_eq!(allocate(&s, &used).unwrap(), None);
    }

    #[test]
    fn test_allocate_honours_allocation_pools() {
        let mut s = subnet("192.168.10.0/24", Some("192.168.10.1"));
        s.allocation_pools = vec![AllocationPool {
            start: "192.168.10.100".to_string(),
            end: "192.168.10.101".to_string(),
        }];
        let used = HashSet::from(["192.168.10.100".parse().unwrap()]);
        assert_eq!(allocate(&s, &used).unwrap(), Some("192.168.10.101".parse().unwrap()));
    }

    #[test]
    fn test_allocate_from_pool_deep_inside_large_prefix() {
        let mut s = subnet("10.0.0.0/8", Some("10.0.0.1"));
        s.allocation_pools = vec![AllocationPool {
            start: "10.5.0.10".to_string(),
            end: "10.5.0.100".to_string(),
        }];
        let mut used = HashSet::new();
        assert_eq!(allocate(&s, &used).unwrap(), Some("10.5.0.10".parse().unwrap()));

        used.insert("10.5.0.10".parse().unwrap());
        assert_eq!(allocate(&s, &used).unwrap(), Some("10.5.0.11".parse().unwrap()));
    }

    #[test]
    fn test_allocate_from_second_pool_and_ipv6() {
        let mut s = subnet("192.168.10.0/24", None);
        s.allocation_pools = vec![
            AllocationPool {
                start: "192.168.10.10".to_string(),
                end: "192.168.10.10".to_string(),
            },
            AllocationPool {
                start: "192.168.10.200".to_string(),
                end: "192.168.10.255".to_string(),
            },
        ];
        let used = HashSet::from(["192.168.10.10".parse().unwrap()]);
        assert_eq!(allocate(&s, &used).unwrap(), Some("192.168.10.200".parse().unwrap()));

        // Broadcast is never handed out even when a pool reaches it
        let used: HashSet<IpAddr> = (10..=254)
            .map(|h| format!("192.168.10.{}", h).parse().unwrap())
            .collect();
        assert_eq!(allocate(&s, &used).unwrap(), None);

        let mut v6 = subnet("fd00::/64", Some("fd00::1"));
        v6.allocation_pools = vec![AllocationPool {
            start: "fd00::5:0".to_string(),
            end: "fd00::5:ff".to_string(),
        }];
        assert_eq!(allocate(&v6, &HashSet::new()).unwrap(), Some("fd00::5:0".parse().unwrap()));
        assert_eq!(
            allocate(&subnet("fd00::/64", Some("fd00::1")), &HashSet::new()).unwrap(),
            Some("fd00::2".parse().unwrap())
        );
    }

    #[test]
    fn test_gateway_must_be_inside() {
        let network = parse_cidr("cidr", "10.0.0.0/24").unwrap();
        assert!(require_in_cidr("gatewayIp", "10.0.0.1".parse().unwrap(), &network).is_ok());
        let err = require_in_cidr("gatewayIp", "10.0.1.1".parse().unwrap(), &network).unwrap_err();
        assert!(matches!(err, SyncError::RangeViolation { .. }));
    }
}
