//! Security resource policies
//!
//! Handles: SecurityGroup, SecurityRule (embedded in its group's rule list)

pub mod group;
pub mod rule;

#[cfg(test)]
mod group_test;

pub use group::SecurityGroupPolicy;
pub use rule::SecurityRulePolicy;

use crate::sync_error::SyncError;
use sdn_client::{typed, PolicyRule, SdnClientTrait, SecurityGroup};

/// Group holding rule `rule_id`, with the rule entry
async fn find_rule(
    client: &dyn SdnClientTrait,
    rule_id: &str,
) -> Result<Option<(SecurityGroup, PolicyRule)>, SyncError> {
    let groups = typed::list::<SecurityGroup>(client, &[]).await?;
    Ok(groups.into_iter().find_map(|group| {
        let rule = group.rule(rule_id).cloned()?;
        Some((group, rule))
    }))
}
