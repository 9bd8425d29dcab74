//! CG-031: Plan. Diff a generated graph against the stored one.

use super::digest;
use super::resource::ResourceDef;
use super::state::GraphFile;
use serde::Serialize;
use std::collections::HashMap;

/// What applying the new graph does to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

/// One planned change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedChange {
    pub address: String,
    pub action: PlanAction,
    pub description: String,
}

/// Full plan with counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPlan {
    pub app: String,
    pub changes: Vec<PlannedChange>,
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}

impl GenerationPlan {
    /// True when applying the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.to_create + self.to_update + self.to_destroy == 0
    }
}

/// Compare `resources` with the previously stored graph, if any.
///
/// New resources are listed in generation order, followed by stored
/// resources that disappeared, in stored order.
pub fn plan(app: &str, resources: &[ResourceDef], stored: Option<&GraphFile>) -> GenerationPlan {
    let previous: HashMap<String, String> = stored
        .map(|g| {
            g.resources
                .iter()
                .map(|r| (r.address(), digest::hash_resource(r)))
                .collect()
        })
        .unwrap_or_default();

    let mut changes = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for resource in resources {
        let address = resource.address();
        let action = match previous.get(&address) {
            None => PlanAction::Create,
            Some(hash) if *hash == digest::hash_resource(resource) => PlanAction::NoOp,
            Some(_) => PlanAction::Update,
        };
        seen.insert(address.clone());
        changes.push(PlannedChange {
            description: describe(&address, action),
            address,
            action,
        });
    }
    if let Some(graph) = stored {
        for resource in &graph.resources {
            let address = resource.address();
            if !seen.contains(&address) {
                changes.push(PlannedChange {
                    description: describe(&address, PlanAction::Destroy),
                    address,
                    action: PlanAction::Destroy,
                });
            }
        }
    }

    let count = |action: PlanAction| changes.iter().filter(|c| c.action == action).count() as u32;
    GenerationPlan {
        app: app.to_string(),
        to_create: count(PlanAction::Create),
        to_update: count(PlanAction::Update),
        to_destroy: count(PlanAction::Destroy),
        unchanged: count(PlanAction::NoOp),
        changes,
    }
}

fn describe(address: &str, action: PlanAction) -> String {
    match action {
        PlanAction::Create => format!("{}: create", address),
        PlanAction::Update => format!("{}: update (content changed)", address),
        PlanAction::Destroy => format!("{}: destroy (no longer generated)", address),
        PlanAction::NoOp => format!("{}: unchanged", address),
    }
}
