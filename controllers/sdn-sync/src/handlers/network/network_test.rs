//! Unit tests for the network policy

#[cfg(test)]
mod tests {
    use crate::handlers::network::NetworkPolicy;
    use crate::handlers::{NetworkHandler, Operation};
    use crate::state::ProtocolState;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sdn_client::{
        FloatingIp as BackendFloatingIp, FloatingIpPool, MockSdnClient, ObjectKind, ObjectMeta, VirtualNetwork,
    };
    use tenant_resources::{Candidate, Network};

    fn handler(mock: &MockSdnClient) -> NetworkHandler {
        test_handler(mock, NetworkPolicy)
    }

    fn net1(id: &str) -> Network {
        Network {
            id: Some(id.to_string()),
            tenant_id: Some(TENANT.to_string()),
            name: Some("net1".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_can_create_requires_tenant() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);

        let no_tenant = Network {
            tenant_id: None,
            ..net1(NETWORK)
        };
        assert_eq!(handler.can_create(&no_tenant).await, StatusCode::BAD_REQUEST);
        // Rejected before any backend call
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_can_create_with_absent_project_after_wait() {
        let mock = MockSdnClient::new("http://test-sdn");
        let handler = handler(&mock);

        assert_eq!(handler.can_create(&net1(NETWORK)).await, StatusCode::NOT_FOUND);
        let lookups = mock
            .calls()
            .iter()
            .filter(|c| c.starts_with("find_by_id project"))
            .count();
        assert_eq!(lookups, 2);
    }

    #[tokio::test]
    async fn test_can_create_rejects_malformed_identifier() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);

        assert_eq!(handler.can_create(&net1("not-a-uuid")).await, StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_can_create_accepts_undashed_identifiers() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);

        let candidate = Network {
            tenant_id: Some(TENANT.replace('-', "")),
            ..net1(&NETWORK.replace('-', ""))
        };
        assert_eq!(handler.can_create(&candidate).await, StatusCode::OK);
        assert!(mock.calls().iter().any(|c| c == &format!("find_by_id project {}", TENANT)));
    }

    #[tokio::test]
    async fn test_can_create_rejects_duplicates() {
        let mock = mock_with_tenant();
        let project = mock.add_project(TENANT, "demo");
        mock.add_object(mock.fixtures().network(&project, NETWORK, "net1"));
        let handler = handler(&mock);

        // Same id
        assert_eq!(handler.can_create(&net1(NETWORK)).await, StatusCode::FORBIDDEN);
        // Same name in the same project
        assert_eq!(handler.can_create(&net1(OTHER_NETWORK)).await, StatusCode::FORBIDDEN);

        let renamed = Network {
            name: Some("net2".to_string()),
            ..net1(OTHER_NETWORK)
        };
        assert_eq!(handler.can_create(&renamed).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_can_delete_blocked_by_dependents() {
        let mock = mock_with_tenant();
        let project = mock.add_project(TENANT, "demo");
        let network = mock.fixtures().network(&project, NETWORK, "net1");
        mock.add_object(network.clone());
        let handler = handler(&mock);

        assert_eq!(handler.can_delete(&net1(NETWORK)).await, StatusCode::OK);

        // A port on the network
        mock.add_object(mock.fixtures().port(&project, &network, PORT));
        assert_eq!(handler.can_delete(&net1(NETWORK)).await, StatusCode::FORBIDDEN);
        mock.remove(ObjectKind::VirtualMachineInterface, PORT);

        // A subnet
        let mut with_subnet = network.clone();
        with_subnet
            .ipam_subnets
            .push(mock.fixtures().subnet(SUBNET, "10.0.0.0/24", Some("10.0.0.1")));
        mock.add_object(with_subnet);
        assert_eq!(handler.can_delete(&net1(NETWORK)).await, StatusCode::FORBIDDEN);
        mock.add_object(network.clone());

        // A floating IP pool
        mock.add_object(mock.fixtures().floating_ip_pool(&network, EXTERNAL_NETWORK));
        assert_eq!(handler.can_delete(&net1(NETWORK)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_can_delete_missing_network() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        assert_eq!(handler.can_delete(&net1(NETWORK)).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_external_network_lifecycle() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        let candidate = Network {
            router_external: Some(true),
            ..net1(NETWORK)
        };

        // Setup: create through the two-phase surface
        assert_eq!(handler.can_create(&candidate).await, StatusCode::OK);
        let report = handler.created(&candidate).await;
        assert_eq!(report.state, ProtocolState::Verified);

        let stored = mock.get::<VirtualNetwork>(NETWORK).unwrap();
        assert_eq!(stored.meta.parent_uuid.as_deref(), Some(TENANT));
        assert!(stored.router_external);
        let pools = mock.all::<FloatingIpPool>();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].meta.parent_uuid.as_deref(), Some(NETWORK));

        // The pool blocks deletion until the network stops being external
        assert_eq!(handler.can_delete(&candidate).await, StatusCode::FORBIDDEN);
        let internal = Network {
            id: Some(NETWORK.to_string()),
            router_external: Some(false),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&internal, &candidate).await, StatusCode::OK);
        let report = handler.updated(&candidate.merge(&internal)).await;
        assert!(report.is_success());
        assert!(mock.all::<FloatingIpPool>().is_empty());
        assert_eq!(handler.can_delete(&candidate).await, StatusCode::OK);

        let report = handler.deleted(&candidate).await;
        assert!(report.is_success());
        assert!(mock.get::<VirtualNetwork>(NETWORK).is_none());
    }

    #[tokio::test]
    async fn test_cannot_make_internal_while_floating_ips_allocated() {
        let mock = mock_with_tenant();
        let project = mock.add_project(TENANT, "demo");
        let mut network = mock.fixtures().network(&project, NETWORK, "public");
        network.router_external = true;
        mock.add_object(network.clone());
        let pool = mock.fixtures().floating_ip_pool(&network, EXTERNAL_NETWORK);
        mock.add_object(pool.clone());
        mock.add_object(BackendFloatingIp {
            meta: ObjectMeta::new(FLOATING_IP, FLOATING_IP, &pool.meta.fq_name, Some(&pool.meta.uuid)),
            address: "192.0.2.10".to_string(),
            fixed_ip_address: None,
            project_refs: vec![],
            virtual_machine_interface_refs: vec![],
        });
        let handler = handler(&mock);

        let delta = Network {
            id: Some(NETWORK.to_string()),
            router_external: Some(false),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&delta, &net1(NETWORK)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_rejects_tenant_change() {
        let mock = mock_with_tenant();
        let project = mock.add_project(TENANT, "demo");
        mock.add_object(mock.fixtures().network(&project, NETWORK, "net1"));
        let handler = handler(&mock);

        let delta = Network {
            id: Some(NETWORK.to_string()),
            tenant_id: Some(OTHER_TENANT.to_string()),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&delta, &net1(NETWORK)).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_apply_create_then_duplicate() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);

        let outcome = handler.apply(Operation::Create { candidate: net1(NETWORK) }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        assert_eq!(outcome.status, StatusCode::OK);

        let outcome = handler.apply(Operation::Create { candidate: net1(NETWORK) }).await;
        assert_eq!(outcome.state, ProtocolState::Rejected);
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert!(outcome.reason.is_some());
    }
}
