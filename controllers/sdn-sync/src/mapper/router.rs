//! Logical routers

use super::{admin_state, assign, assign_refs, project_child, rename};
use sdn_client::{LogicalRouter, ObjectRef, Project, VirtualMachineInterface, VirtualNetwork};
use tenant_resources::Router;

fn gateway_refs(gateway: Option<&VirtualNetwork>) -> Vec<ObjectRef> {
    gateway.map(|n| vec![ObjectRef::to_meta(&n.meta)]).unwrap_or_default()
}

fn interface_refs(interfaces: &[VirtualMachineInterface]) -> Vec<ObjectRef> {
    interfaces.iter().map(|p| ObjectRef::to_meta(&p.meta)).collect()
}

pub fn router_to_backend(
    candidate: &Router,
    id: &str,
    project: &Project,
    gateway: Option<&VirtualNetwork>,
    interfaces: &[VirtualMachineInterface],
) -> LogicalRouter {
    LogicalRouter {
        meta: project_child(id, candidate.name.as_deref(), project),
        admin_state_up: admin_state(candidate.admin_state_up),
        gateway_network_refs: gateway_refs(gateway),
        virtual_machine_interface_refs: interface_refs(interfaces),
    }
}

/// Applies the mutable router fields; `gateway` is `Some(None)` to clear it
pub fn apply_router(
    router: &mut LogicalRouter,
    candidate: &Router,
    gateway: Option<Option<&VirtualNetwork>>,
    interfaces: Option<&[VirtualMachineInterface]>,
) -> bool {
    let mut changed = rename(&mut router.meta, candidate.name.as_deref());
    changed |= assign(&mut router.admin_state_up, candidate.admin_state_up.as_ref());
    if let Some(gateway) = gateway {
        changed |= assign_refs(&mut router.gateway_network_refs, gateway_refs(gateway));
    }
    if let Some(interfaces) = interfaces {
        changed |= assign_refs(&mut router.virtual_machine_interface_refs, interface_refs(interfaces));
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_client::mock::Fixtures;

    #[test]
    fn test_gateway_can_be_cleared() {
        let fixtures = Fixtures::new("default-domain");
        let project = fixtures.project("p1", "demo");
        let public = fixtures.network(&project, "ext", "public");
        let candidate = Router {
            name: Some("r1".to_string()),
            ..Default::default()
        };

        let mut router = router_to_backend(&candidate, "r1", &project, Some(&public), &[]);
        assert_eq!(router.gateway_network_refs.len(), 1);
        assert!(!apply_router(&mut router, &candidate, Some(Some(&public)), None));
        assert!(apply_router(&mut router, &candidate, Some(None), None));
        assert!(router.gateway_network_refs.is_empty());
    }
}
