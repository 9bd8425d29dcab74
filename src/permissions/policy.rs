//! CG-012: Render grants as platform policy documents.

use super::model::{Permission, ResourceKind};
use serde::Serialize;
use std::collections::BTreeSet;

/// One IAM statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: &'static str,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

/// IAM policy document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    /// Compact JSON encoding.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One statement per AWS grant. Grants whose level carries no actions
/// (e.g. write on a table index) produce nothing.
pub fn aws_policy(grants: &BTreeSet<Permission>, region: &str, account: &str) -> PolicyDocument {
    let statement = grants
        .iter()
        .filter_map(|grant| {
            let ResourceKind::Aws(resource) = grant.kind else {
                return None;
            };
            let action: Vec<String> = resource.actions(grant.level).into_iter().collect();
            if action.is_empty() {
                return None;
            }
            let glob = resource.glob(region, account);
            Some(Statement {
                effect: "Allow",
                action,
                resource: grant
                    .patterns
                    .iter()
                    .map(|p| format!("{}:{}", glob, p))
                    .collect(),
            })
        })
        .collect();
    PolicyDocument {
        version: "2012-10-17",
        statement,
    }
}

/// Role assignment derived from an Azure grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RoleAssignment {
    pub role: &'static str,
    pub scope: String,
}

/// Role assignments for every Azure grant, one per pattern.
pub fn azure_roles(grants: &BTreeSet<Permission>, subscription: &str) -> Vec<RoleAssignment> {
    let mut roles = BTreeSet::new();
    for grant in grants {
        let ResourceKind::Azure(resource) = grant.kind else {
            continue;
        };
        for pattern in &grant.patterns {
            roles.insert(RoleAssignment {
                role: resource.role(grant.level),
                scope: resource.scope(pattern, subscription),
            });
        }
    }
    roles.into_iter().collect()
}
