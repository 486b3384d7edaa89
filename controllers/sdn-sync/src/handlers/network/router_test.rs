//! Unit tests for the router policy

#[cfg(test)]
mod tests {
    use crate::handlers::network::{NetworkPolicy, RouterPolicy};
    use crate::handlers::{Operation, RouterHandler};
    use crate::state::ProtocolState;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sdn_client::{LogicalRouter, MockSdnClient, ObjectMeta, ObjectRef, Project, VirtualNetwork};
    use tenant_resources::{Network, Router, RouterGateway};

    fn handler(mock: &MockSdnClient) -> RouterHandler {
        test_handler(mock, RouterPolicy)
    }

    /// Tenant with an internal network, an external one and one port on the internal one
    fn mock_with_networks() -> (MockSdnClient, Project) {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project(TENANT, "demo");
        let internal = mock.fixtures().network(&project, NETWORK, "private");
        let mut external = mock.fixtures().network(&project, EXTERNAL_NETWORK, "public");
        external.router_external = true;
        mock.add_object(mock.fixtures().port(&project, &internal, PORT));
        mock.add_object(internal);
        mock.add_object(external);
        (mock, project)
    }

    fn router(id: &str) -> Router {
        Router {
            id: Some(id.to_string()),
            tenant_id: Some(TENANT.to_string()),
            name: Some("r1".to_string()),
            ..Default::default()
        }
    }

    fn gateway(network: &str) -> Option<RouterGateway> {
        Some(RouterGateway {
            network_id: Some(network.to_string()),
        })
    }

    #[tokio::test]
    async fn test_create_with_gateway_and_interface() {
        let (mock, _) = mock_with_networks();
        let handler = handler(&mock);
        let candidate = Router {
            external_gateway: gateway(EXTERNAL_NETWORK),
            interfaces: Some(vec![PORT.to_string()]),
            ..router(ROUTER)
        };

        let outcome = handler.apply(Operation::Create { candidate }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);

        let stored = mock.get::<LogicalRouter>(ROUTER).unwrap();
        assert_eq!(stored.meta.name, "r1");
        assert_eq!(stored.gateway_network_refs[0].uuid, EXTERNAL_NETWORK);
        assert_eq!(stored.virtual_machine_interface_refs[0].uuid, PORT);
    }

    #[tokio::test]
    async fn test_gateway_must_be_external() {
        let (mock, _) = mock_with_networks();
        let handler = handler(&mock);

        let internal = Router {
            external_gateway: gateway(NETWORK),
            ..router(ROUTER)
        };
        assert_eq!(handler.can_create(&internal).await, StatusCode::BAD_REQUEST);

        let unknown = Router {
            external_gateway: gateway(OTHER_NETWORK),
            ..router(ROUTER)
        };
        assert_eq!(handler.can_create(&unknown).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_interface_checks() {
        let (mock, project) = mock_with_networks();
        let other = mock.add_project(OTHER_TENANT, "other");
        let network = mock.get::<VirtualNetwork>(NETWORK).unwrap();
        mock.add_object(mock.fixtures().port(&other, &network, OTHER_PORT));
        let handler = handler(&mock);

        let unknown = Router {
            interfaces: Some(vec![DEVICE.to_string()]),
            ..router(ROUTER)
        };
        assert_eq!(handler.can_create(&unknown).await, StatusCode::FORBIDDEN);

        let foreign = Router {
            interfaces: Some(vec![OTHER_PORT.to_string()]),
            ..router(ROUTER)
        };
        assert_eq!(handler.can_create(&foreign).await, StatusCode::FORBIDDEN);

        // PORT already sits on another router
        mock.add_object(LogicalRouter {
            meta: ObjectMeta::new(FLOATING_IP, "r0", &project.meta.fq_name, Some(TENANT)),
            admin_state_up: true,
            gateway_network_refs: vec![],
            virtual_machine_interface_refs: vec![ObjectRef::new(PORT, &[])],
        });
        let taken = Router {
            interfaces: Some(vec![PORT.to_string()]),
            ..router(ROUTER)
        };
        assert_eq!(handler.can_create(&taken).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_name_is_unique_per_project() {
        let (mock, _) = mock_with_networks();
        let handler = handler(&mock);
        assert!(handler.created(&router(ROUTER)).await.is_success());

        assert_eq!(handler.can_create(&router(DEVICE)).await, StatusCode::FORBIDDEN);
        let renamed = Router {
            name: Some("r2".to_string()),
            ..router(DEVICE)
        };
        assert_eq!(handler.can_create(&renamed).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_sets_and_clears_gateway() {
        let (mock, _) = mock_with_networks();
        let handler = handler(&mock);
        let original = router(ROUTER);
        assert!(handler.created(&original).await.is_success());

        let set = Router {
            id: Some(ROUTER.to_string()),
            external_gateway: gateway(EXTERNAL_NETWORK),
            ..Default::default()
        };
        let outcome = handler
            .apply(Operation::Update {
                delta: set,
                original: original.clone(),
            })
            .await;
        assert!(outcome.is_success());
        assert_eq!(mock.get::<LogicalRouter>(ROUTER).unwrap().gateway_network_refs.len(), 1);

        // The external network now has a router gateway and cannot be deleted
        let networks = test_handler(&mock, NetworkPolicy);
        let public = Network {
            id: Some(EXTERNAL_NETWORK.to_string()),
            ..Default::default()
        };
        assert_eq!(networks.can_delete(&public).await, StatusCode::FORBIDDEN);

        let clear = Router {
            id: Some(ROUTER.to_string()),
            external_gateway: Some(RouterGateway { network_id: None }),
            ..Default::default()
        };
        let outcome = handler.apply(Operation::Update { delta: clear, original }).await;
        assert!(outcome.is_success());
        assert!(mock.get::<LogicalRouter>(ROUTER).unwrap().gateway_network_refs.is_empty());
        assert_eq!(networks.can_delete(&public).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_interfaces() {
        let (mock, _) = mock_with_networks();
        let handler = handler(&mock);
        let candidate = Router {
            interfaces: Some(vec![PORT.to_string()]),
            ..router(ROUTER)
        };
        assert!(handler.created(&candidate).await.is_success());
        assert_eq!(handler.can_delete(&candidate).await, StatusCode::FORBIDDEN);

        let detach = Router {
            id: Some(ROUTER.to_string()),
            interfaces: Some(vec![]),
            ..Default::default()
        };
        assert!(handler.apply(Operation::Update { delta: detach, original: candidate.clone() }).await.is_success());
        let outcome = handler.apply(Operation::Delete { candidate }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        assert!(mock.get::<LogicalRouter>(ROUTER).is_none());
    }
}
