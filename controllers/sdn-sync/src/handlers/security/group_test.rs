//! Unit tests for the security group policy

#[cfg(test)]
mod tests {
    use crate::handlers::security::SecurityGroupPolicy;
    use crate::handlers::{Operation, SecurityGroupHandler};
    use crate::state::ProtocolState;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sdn_client::{MockSdnClient, ObjectRef, PolicyRule, SecurityGroup as BackendGroup, VirtualMachineInterface};
    use tenant_resources::SecurityGroup;

    fn handler(mock: &MockSdnClient) -> SecurityGroupHandler {
        test_handler(mock, SecurityGroupPolicy)
    }

    fn group(id: &str, name: &str) -> SecurityGroup {
        SecurityGroup {
            id: Some(id.to_string()),
            tenant_id: Some(TENANT.to_string()),
            name: Some(name.to_string()),
            description: Some("web tier".to_string()),
        }
    }

    fn remote_rule(remote_group: &str) -> PolicyRule {
        PolicyRule {
            rule_uuid: RULE.to_string(),
            direction: "ingress".to_string(),
            protocol: "tcp".to_string(),
            ethertype: "IPv4".to_string(),
            port_min: Some(5432),
            port_max: Some(5432),
            remote_cidr: None,
            remote_group: Some(remote_group.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_group() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);

        let outcome = handler.apply(Operation::Create { candidate: group(GROUP, "web") }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);

        let stored = mock.get::<BackendGroup>(GROUP).unwrap();
        assert_eq!(stored.meta.name, "web");
        assert_eq!(stored.meta.parent_uuid.as_deref(), Some(TENANT));
        assert_eq!(stored.description.as_deref(), Some("web tier"));
        assert!(stored.rules.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        let unnamed = SecurityGroup {
            name: None,
            ..group(GROUP, "")
        };
        assert_eq!(handler.can_create(&unnamed).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        assert!(handler.created(&group(GROUP, "web")).await.is_success());

        assert_eq!(handler.can_create(&group(GROUP, "other")).await, StatusCode::FORBIDDEN);
        assert_eq!(handler.can_create(&group(OTHER_GROUP, "web")).await, StatusCode::FORBIDDEN);
        assert_eq!(handler.can_create(&group(OTHER_GROUP, "db")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rename_keeps_uniqueness() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        assert!(handler.created(&group(GROUP, "web")).await.is_success());
        assert!(handler.created(&group(OTHER_GROUP, "db")).await.is_success());

        let clash = SecurityGroup {
            id: Some(OTHER_GROUP.to_string()),
            name: Some("web".to_string()),
            ..Default::default()
        };
        assert_eq!(
            handler.can_update(&clash, &group(OTHER_GROUP, "db")).await,
            StatusCode::FORBIDDEN
        );

        let describe = SecurityGroup {
            id: Some(OTHER_GROUP.to_string()),
            description: Some("database tier".to_string()),
            ..Default::default()
        };
        let outcome = handler
            .apply(Operation::Update {
                delta: describe,
                original: group(OTHER_GROUP, "db"),
            })
            .await;
        assert!(outcome.is_success());
        let stored = mock.get::<BackendGroup>(OTHER_GROUP).unwrap();
        assert_eq!(stored.description.as_deref(), Some("database tier"));
    }

    #[tokio::test]
    async fn test_delete_blocked_by_attached_port() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        assert!(handler.created(&group(GROUP, "web")).await.is_success());

        let project = mock.fixtures().project(TENANT, "demo");
        let network = mock.fixtures().network(&project, NETWORK, "net1");
        let mut port = mock.fixtures().port(&project, &network, PORT);
        port.security_group_refs.push(ObjectRef::new(GROUP, &[]));
        mock.add_object(port);

        assert_eq!(handler.can_delete(&group(GROUP, "web")).await, StatusCode::FORBIDDEN);

        mock.remove(sdn_client::ObjectKind::VirtualMachineInterface, PORT);
        assert!(mock.get::<VirtualMachineInterface>(PORT).is_none());
        assert_eq!(handler.can_delete(&group(GROUP, "web")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_remote_group_rule() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        assert!(handler.created(&group(GROUP, "web")).await.is_success());
        assert!(handler.created(&group(OTHER_GROUP, "db")).await.is_success());

        let mut db = mock.get::<BackendGroup>(OTHER_GROUP).unwrap();
        db.rules.push(remote_rule(GROUP));
        mock.add_object(db);
        assert_eq!(handler.can_delete(&group(GROUP, "web")).await, StatusCode::FORBIDDEN);

        // Only other groups count; nothing names db as remote
        let mut web = mock.get::<BackendGroup>(GROUP).unwrap();
        web.rules.push(remote_rule(GROUP));
        mock.add_object(web);
        assert_eq!(handler.can_delete(&group(OTHER_GROUP, "db")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_group() {
        let mock = mock_with_tenant();
        let handler = handler(&mock);
        assert!(handler.created(&group(GROUP, "web")).await.is_success());

        let outcome = handler.apply(Operation::Delete { candidate: group(GROUP, "web") }).await;
        assert_eq!(outcome.state, ProtocolState::Verified);
        assert!(mock.get::<BackendGroup>(GROUP).is_none());
        assert_eq!(handler.can_delete(&group(GROUP, "web")).await, StatusCode::NOT_FOUND);
    }
}
