//! Unit tests for the port policy

#[cfg(test)]
mod tests {
    use crate::handlers::network::PortPolicy;
    use crate::handlers::{Operation, PortHandler};
    use crate::state::ProtocolState;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sdn_client::{
        AllocationPool, InstanceIp, LogicalRouter, MockSdnClient, ObjectMeta, ObjectRef, VirtualMachine, VirtualMachineInterface,
        VirtualNetwork,
    };
    use tenant_resources::{FixedIp, Port};

    const MAC: &str = "02:aa:bb:cc:dd:ee";

    fn handler(mock: &MockSdnClient) -> PortHandler {
        test_handler(mock, PortPolicy)
    }

    /// Tenant network with SUBNET 10.0.0.0/24 (gateway 10.0.0.1)
    fn mock_with_subnet() -> MockSdnClient {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project(TENANT, "demo");
        let mut network = mock.fixtures().network(&project, NETWORK, "net1");
        network
            .ipam_subnets
            .push(mock.fixtures().subnet(SUBNET, "10.0.0.0/24", Some("10.0.0.1")));
        mock.add_object(network);
        mock
    }

    fn port(id: &str) -> Port {
        Port {
            id: Some(id.to_string()),
            network_id: Some(NETWORK.to_string()),
            tenant_id: Some(TENANT.to_string()),
            mac_address: Some(MAC.to_string()),
            ..Default::default()
        }
    }

    fn fixed(address: &str) -> FixedIp {
        FixedIp {
            subnet_id: Some(SUBNET.to_string()),
            ip_address: Some(address.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_allocates_address_on_first_subnet() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);

        let outcome = handler.apply(Operation::Create { candidate: port(PORT) }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);

        let vmi = mock.get::<VirtualMachineInterface>(PORT).unwrap();
        assert_eq!(vmi.mac_addresses, vec![MAC.to_string()]);
        assert_eq!(vmi.virtual_network_refs[0].uuid, NETWORK);
        let iips = mock.all::<InstanceIp>();
        assert_eq!(iips.len(), 1);
        assert_eq!(iips[0].address, "10.0.0.2");
        assert_eq!(iips[0].subnet_uuid.as_deref(), Some(SUBNET));
    }

    #[tokio::test]
    async fn test_create_generates_mac_when_absent() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        let candidate = Port {
            mac_address: None,
            ..port(PORT)
        };

        assert!(handler.created(&candidate).await.is_success());
        let vmi = mock.get::<VirtualMachineInterface>(PORT).unwrap();
        assert!(vmi.mac_addresses[0].starts_with("02:"));
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_mac() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        let candidate = Port {
            mac_address: Some("02:aa:bb:cc:dd".to_string()),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&candidate).await, StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_mac() {
        let mock = mock_with_subnet();
        let project = mock.fixtures().project(TENANT, "demo");
        let network = mock.get::<VirtualNetwork>(NETWORK).unwrap();
        mock.add_object(mock.fixtures().port(&project, &network, OTHER_PORT));
        let handler = handler(&mock);

        let clash = Port {
            mac_address: Some("02:00:00:00:00:01".to_string()),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&clash).await, StatusCode::FORBIDDEN);
        assert_eq!(handler.can_create(&port(PORT)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_requires_attachable_network() {
        let mock = mock_with_subnet();
        mock.add_project(OTHER_TENANT, "other");
        let handler = handler(&mock);
        let foreign = Port {
            tenant_id: Some(OTHER_TENANT.to_string()),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&foreign).await, StatusCode::FORBIDDEN);

        // Shared networks are open to every tenant
        let mut network = mock.get::<VirtualNetwork>(NETWORK).unwrap();
        network.is_shared = true;
        mock.add_object(network);
        assert_eq!(handler.can_create(&foreign).await, StatusCode::OK);

        let missing = Port {
            network_id: Some(OTHER_NETWORK.to_string()),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&missing).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_fixed_ip_checks() {
        let mock = mock_with_subnet();
        let network = mock.get::<VirtualNetwork>(NETWORK).unwrap();
        mock.add_object(InstanceIp {
            meta: ObjectMeta::new(DEVICE, DEVICE, &[], None),
            address: "10.0.0.5".to_string(),
            subnet_uuid: Some(SUBNET.to_string()),
            virtual_network_refs: vec![ObjectRef::to_meta(&network.meta)],
            virtual_machine_interface_refs: vec![],
        });
        let handler = handler(&mock);

        let in_use = Port {
            fixed_ips: Some(vec![fixed("10.0.0.5")]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&in_use).await, StatusCode::FORBIDDEN);

        let twice = Port {
            fixed_ips: Some(vec![fixed("10.0.0.6"), fixed("10.0.0.6")]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&twice).await, StatusCode::BAD_REQUEST);

        let outside = Port {
            fixed_ips: Some(vec![fixed("10.9.0.6")]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&outside).await, StatusCode::BAD_REQUEST);

        let unknown_subnet = Port {
            fixed_ips: Some(vec![FixedIp {
                subnet_id: Some(OTHER_SUBNET.to_string()),
                ip_address: None,
            }]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&unknown_subnet).await, StatusCode::FORBIDDEN);

        let free = Port {
            fixed_ips: Some(vec![fixed("10.0.0.6")]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&free).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_allocates_from_pool_deep_in_large_subnet() {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project(TENANT, "demo");
        let mut network = mock.fixtures().network(&project, NETWORK, "net1");
        let mut subnet = mock.fixtures().subnet(SUBNET, "10.0.0.0/8", Some("10.0.0.1"));
        subnet.allocation_pools = vec![AllocationPool {
            start: "10.5.0.10".to_string(),
            end: "10.5.0.100".to_string(),
        }];
        network.ipam_subnets.push(subnet);
        mock.add_object(network);
        let handler = handler(&mock);

        assert_eq!(handler.can_create(&port(PORT)).await, StatusCode::OK);
        let outcome = handler.apply(Operation::Create { candidate: port(PORT) }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        let iips = mock.all::<InstanceIp>();
        assert_eq!(iips.len(), 1);
        assert_eq!(iips[0].address, "10.5.0.10");
    }

    #[tokio::test]
    async fn test_create_rejects_exhausted_subnet() {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project(TENANT, "demo");
        let mut network = mock.fixtures().network(&project, NETWORK, "net1");
        // Only 10.0.0.2 is assignable besides the gateway
        network
            .ipam_subnets
            .push(mock.fixtures().subnet(SUBNET, "10.0.0.0/30", Some("10.0.0.1")));
        mock.add_object(network.clone());
        mock.add_object(InstanceIp {
            meta: ObjectMeta::new(DEVICE, DEVICE, &[], None),
            address: "10.0.0.2".to_string(),
            subnet_uuid: Some(SUBNET.to_string()),
            virtual_network_refs: vec![ObjectRef::to_meta(&network.meta)],
            virtual_machine_interface_refs: vec![],
        });
        let handler = handler(&mock);

        assert_eq!(handler.can_create(&port(PORT)).await, StatusCode::BAD_REQUEST);
        let outcome = handler.apply(Operation::Create { candidate: port(PORT) }).await;
        assert_eq!(outcome.state, ProtocolState::Rejected);
        assert!(mock.get::<VirtualMachineInterface>(PORT).is_none());
    }

    #[tokio::test]
    async fn test_create_checks_security_groups() {
        let mock = mock_with_subnet();
        let project = mock.fixtures().project(TENANT, "demo");
        mock.add_object(mock.fixtures().security_group(&project, GROUP, "web"));
        let other = mock.add_project(OTHER_TENANT, "other");
        mock.add_object(mock.fixtures().security_group(&other, OTHER_GROUP, "db"));
        let handler = handler(&mock);

        let unknown = Port {
            security_groups: Some(vec![RULE.to_string()]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&unknown).await, StatusCode::FORBIDDEN);

        let foreign = Port {
            security_groups: Some(vec![OTHER_GROUP.to_string()]),
            ..port(PORT)
        };
        assert_eq!(handler.can_create(&foreign).await, StatusCode::FORBIDDEN);

        let own = Port {
            security_groups: Some(vec![GROUP.to_string()]),
            ..port(PORT)
        };
        assert!(handler.apply(Operation::Create { candidate: own }).await.is_success());
        let vmi = mock.get::<VirtualMachineInterface>(PORT).unwrap();
        assert_eq!(vmi.security_group_refs[0].uuid, GROUP);
    }

    #[tokio::test]
    async fn test_mac_address_is_immutable() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        assert!(handler.created(&port(PORT)).await.is_success());

        let delta = Port {
            id: Some(PORT.to_string()),
            mac_address: Some("02:aa:bb:cc:dd:ff".to_string()),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&delta, &port(PORT)).await, StatusCode::BAD_REQUEST);

        let same = Port {
            id: Some(PORT.to_string()),
            mac_address: Some(MAC.to_string()),
            name: Some("eth0".to_string()),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&same, &port(PORT)).await, StatusCode::OK);

        let moved = Port {
            id: Some(PORT.to_string()),
            network_id: Some(OTHER_NETWORK.to_string()),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&moved, &port(PORT)).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_replaces_fixed_ips_and_device() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        let original = Port {
            device_id: Some(DEVICE.to_string()),
            ..port(PORT)
        };
        assert!(handler.created(&original).await.is_success());
        assert!(mock.get::<VirtualMachine>(DEVICE).is_some());

        let delta = Port {
            id: Some(PORT.to_string()),
            device_id: Some(String::new()),
            fixed_ips: Some(vec![fixed("10.0.0.9")]),
            ..Default::default()
        };
        let outcome = handler.apply(Operation::Update { delta, original }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);

        let iips = mock.all::<InstanceIp>();
        assert_eq!(iips.len(), 1);
        assert_eq!(iips[0].address, "10.0.0.9");
        let vmi = mock.get::<VirtualMachineInterface>(PORT).unwrap();
        assert!(vmi.virtual_machine_refs.is_empty());
        // The device lost its only interface
        assert!(mock.get::<VirtualMachine>(DEVICE).is_none());
    }

    #[tokio::test]
    async fn test_delete_blocked_while_router_interface() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        assert!(handler.created(&port(PORT)).await.is_success());
        let vmi = mock.get::<VirtualMachineInterface>(PORT).unwrap();
        let project = mock.fixtures().project(TENANT, "demo");
        mock.add_object(LogicalRouter {
            meta: ObjectMeta::new(ROUTER, "r1", &project.meta.fq_name, Some(TENANT)),
            admin_state_up: true,
            gateway_network_refs: vec![],
            virtual_machine_interface_refs: vec![ObjectRef::to_meta(&vmi.meta)],
        });

        assert_eq!(handler.can_delete(&port(PORT)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_cleans_up_addresses_and_device() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        let candidate = Port {
            device_id: Some(DEVICE.to_string()),
            ..port(PORT)
        };
        assert!(handler.created(&candidate).await.is_success());
        assert_eq!(mock.all::<InstanceIp>().len(), 1);

        let outcome = handler.apply(Operation::Delete { candidate }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        assert!(mock.get::<VirtualMachineInterface>(PORT).is_none());
        assert!(mock.all::<InstanceIp>().is_empty());
        assert!(mock.get::<VirtualMachine>(DEVICE).is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_port() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        assert_eq!(handler.can_delete(&port(PORT)).await, StatusCode::NOT_FOUND);
    }
}
