//! Backend object mapping
//!
//! Converts accepted candidates into the controller's object graph. Standalone
//! resources map to their own backend object; subnets and security rules are
//! entries in a list attribute of their parent (see [`embedded`]).

pub mod embedded;
pub mod lbaas;
pub mod network;
pub mod port;
pub mod router;
pub mod security;

pub use embedded::{mutate, mutate_embedded, EmbeddedList};

use crate::sync_error::SyncError;
use sdn_client::{typed, IpamSubnet, ObjectMeta, ObjectRef, Project, SdnClientTrait, VirtualNetwork};

/// Admin state defaults to up
pub fn admin_state(value: Option<bool>) -> bool {
    value.unwrap_or(true)
}

/// Backend name of a resource: its name if given, else its id
pub fn backend_name(name: Option<&str>, id: &str) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n.to_string(),
        _ => id.to_string(),
    }
}

/// Identity block for a resource owned by `project`
pub fn project_child(id: &str, name: Option<&str>, project: &Project) -> ObjectMeta {
    let mut meta = ObjectMeta::new(id, &backend_name(name, id), &project.meta.fq_name, Some(&project.meta.uuid));
    if let Some(display) = name {
        meta.display_name = display.to_string();
    }
    meta
}

/// Renames an object in place; returns whether anything changed
pub fn rename(meta: &mut ObjectMeta, name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    if meta.display_name == name {
        return false;
    }
    meta.display_name = name.to_string();
    true
}

/// Sets `target` to `value` if given; returns whether it changed
pub fn assign<T: PartialEq + Clone>(target: &mut T, value: Option<&T>) -> bool {
    match value {
        Some(v) if v != target => {
            *target = v.clone();
            true
        }
        _ => false,
    }
}

/// Replaces a reference list if it differs (compared by uuid)
pub fn assign_refs(target: &mut Vec<ObjectRef>, refs: Vec<ObjectRef>) -> bool {
    let same = target.len() == refs.len() && target.iter().zip(&refs).all(|(a, b)| a.uuid == b.uuid);
    if same {
        return false;
    }
    *target = refs;
    true
}

/// Locally administered unicast MAC derived from a port id
pub fn mac_for(id: &str) -> String {
    let hex: Vec<char> = id.chars().filter(char::is_ascii_hexdigit).collect();
    let mut octets = vec!["02".to_string()];
    for pair in hex.chunks(2).take(5) {
        octets.push(pair.iter().collect::<String>().to_ascii_lowercase());
    }
    octets.join(":")
}

/// Network holding the subnet `subnet_id`, with the subnet entry
pub async fn find_subnet(
    client: &dyn SdnClientTrait,
    subnet_id: &str,
) -> Result<Option<(VirtualNetwork, IpamSubnet)>, SyncError> {
    let networks = typed::list::<VirtualNetwork>(client, &[]).await?;
    Ok(networks.into_iter().find_map(|network| {
        let subnet = network.subnet(subnet_id).cloned()?;
        Some((network, subnet))
    }))
}
