//! Unit tests for the pool policy

#[cfg(test)]
mod tests {
    use crate::handlers::lbaas::{HealthMonitorPolicy, ListenerPolicy, MemberPolicy, PoolPolicy};
    use crate::handlers::{Operation, PoolHandler};
    use crate::state::ProtocolState;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sdn_client::{LoadbalancerPool, MockSdnClient};
    use tenant_resources::{HealthMonitor, Listener, Member, Pool};

    fn handler(mock: &MockSdnClient) -> PoolHandler {
        test_handler(mock, PoolPolicy)
    }

    /// Tenant with a network holding SUBNET 10.0.0.0/24
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

    fn pool(id: &str) -> Pool {
        Pool {
            id: Some(id.to_string()),
            tenant_id: Some(TENANT.to_string()),
            name: Some("web".to_string()),
            protocol: Some("http".to_string()),
            ..Default::default()
        }
    }

    fn monitor(id: &str, tenant: &str) -> HealthMonitor {
        HealthMonitor {
            id: Some(id.to_string()),
            tenant_id: Some(tenant.to_string()),
            monitor_type: Some("TCP".to_string()),
            delay: Some(5),
            timeout: Some(3),
            max_retries: Some(3),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_pool_with_defaults() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);

        let outcome = handler.apply(Operation::Create { candidate: pool(POOL) }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);

        let stored = mock.get::<LoadbalancerPool>(POOL).unwrap();
        assert_eq!(stored.meta.name, "web");
        assert_eq!(stored.protocol, "HTTP");
        assert_eq!(stored.lb_method, "ROUND_ROBIN");
        assert_eq!(stored.provider, "native");
        assert!(stored.admin_state_up);
        assert!(stored.healthmonitor_refs.is_empty());
    }

    #[tokio::test]
    async fn test_create_field_checks() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);

        let no_protocol = Pool {
            protocol: None,
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&no_protocol).await, StatusCode::BAD_REQUEST);

        let bad_algorithm = Pool {
            lb_algorithm: Some("random".to_string()),
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&bad_algorithm).await, StatusCode::BAD_REQUEST);

        let other_provider = Pool {
            provider: Some("octavia".to_string()),
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&other_provider).await, StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());

        let native = Pool {
            provider: Some("Native".to_string()),
            lb_algorithm: Some("source-ip".to_string()),
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&native).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        assert!(handler.created(&pool(POOL)).await.is_success());

        assert_eq!(handler.can_create(&pool(POOL)).await, StatusCode::FORBIDDEN);
        assert_eq!(handler.can_create(&pool(MEMBER)).await, StatusCode::FORBIDDEN);

        let unnamed = Pool {
            name: None,
            ..pool(MEMBER)
        };
        assert_eq!(handler.can_create(&unnamed).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_checks_subnet_and_monitors() {
        let mock = mock_with_subnet();
        mock.add_project(OTHER_TENANT, "other");
        let monitors = test_handler(&mock, HealthMonitorPolicy);
        assert!(monitors.created(&monitor(MONITOR, TENANT)).await.is_success());
        assert!(monitors.created(&monitor(DEVICE, OTHER_TENANT)).await.is_success());
        let handler = handler(&mock);

        let unknown_subnet = Pool {
            subnet_id: Some(OTHER_SUBNET.to_string()),
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&unknown_subnet).await, StatusCode::FORBIDDEN);

        let unknown_monitor = Pool {
            health_monitors: Some(vec![LISTENER.to_string()]),
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&unknown_monitor).await, StatusCode::FORBIDDEN);

        let foreign_monitor = Pool {
            health_monitors: Some(vec![DEVICE.to_string()]),
            ..pool(POOL)
        };
        assert_eq!(handler.can_create(&foreign_monitor).await, StatusCode::FORBIDDEN);

        let candidate = Pool {
            subnet_id: Some(SUBNET.to_string()),
            health_monitors: Some(vec![MONITOR.to_string()]),
            ..pool(POOL)
        };
        assert!(handler.apply(Operation::Create { candidate }).await.is_success());
        let stored = mock.get::<LoadbalancerPool>(POOL).unwrap();
        assert_eq!(stored.subnet_uuid.as_deref(), Some(SUBNET));
        assert_eq!(stored.healthmonitor_refs[0].uuid, MONITOR);

        // The monitor is now in use
        assert_eq!(
            monitors.can_delete(&monitor(MONITOR, TENANT)).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_update_rules() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        let original = Pool {
            subnet_id: Some(SUBNET.to_string()),
            ..pool(POOL)
        };
        assert!(handler.created(&original).await.is_success());

        let reprotocol = Pool {
            id: Some(POOL.to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&reprotocol, &original).await, StatusCode::BAD_REQUEST);

        let resubnet = Pool {
            id: Some(POOL.to_string()),
            subnet_id: Some(OTHER_SUBNET.to_string()),
            ..Default::default()
        };
        assert_eq!(handler.can_update(&resubnet, &original).await, StatusCode::BAD_REQUEST);

        let rebalance = Pool {
            id: Some(POOL.to_string()),
            lb_algorithm: Some("least-connections".to_string()),
            admin_state_up: Some(false),
            ..Default::default()
        };
        let outcome = handler
            .apply(Operation::Update {
                delta: rebalance,
                original,
            })
            .await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        let stored = mock.get::<LoadbalancerPool>(POOL).unwrap();
        assert_eq!(stored.lb_method, "LEAST_CONNECTIONS");
        assert!(!stored.admin_state_up);
        assert_eq!(stored.protocol, "HTTP");
    }

    #[tokio::test]
    async fn test_delete_blocked_by_members_and_listeners() {
        let mock = mock_with_subnet();
        let handler = handler(&mock);
        assert!(handler.created(&pool(POOL)).await.is_success());

        let members = test_handler(&mock, MemberPolicy);
        let member = Member {
            id: Some(MEMBER.to_string()),
            pool_id: Some(POOL.to_string()),
            tenant_id: Some(TENANT.to_string()),
            address: Some("10.0.0.5".to_string()),
            protocol_port: Some(8080),
            ..Default::default()
        };
        assert!(members.created(&member).await.is_success());
        assert_eq!(handler.can_delete(&pool(POOL)).await, StatusCode::FORBIDDEN);
        assert!(members.deleted(&member).await.is_success());
        assert_eq!(handler.can_delete(&pool(POOL)).await, StatusCode::OK);

        let listeners = test_handler(&mock, ListenerPolicy);
        let listener = Listener {
            id: Some(LISTENER.to_string()),
            tenant_id: Some(TENANT.to_string()),
            protocol: Some("HTTP".to_string()),
            protocol_port: Some(80),
            default_pool_id: Some(POOL.to_string()),
            ..Default::default()
        };
        assert!(listeners.created(&listener).await.is_success());
        assert_eq!(handler.can_delete(&pool(POOL)).await, StatusCode::FORBIDDEN);
        assert!(listeners.deleted(&listener).await.is_success());

        let outcome = handler.apply(Operation::Delete { candidate: pool(POOL) }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        assert!(mock.get::<LoadbalancerPool>(POOL).is_none());
    }
}
