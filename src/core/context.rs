//! CG-005: Generation context. Pass-scoped store of outputs and resources.
//!
//! The context is the exclusive owner of the output store and the resource
//! accumulator. Producers only read from it; the scheduler commits their
//! results. It lives for exactly one generation pass.

use super::error::GenerationError;
use super::producer::{EntityId, Producer, ProducerId};
use super::resource::ResourceDef;
use super::types::Schema;
use crate::permissions::{Grants, Permission};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeSet, HashSet};

/// Key of a memoized output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey {
    pub producer: ProducerId,
    pub entity: EntityId,
}

struct OutputEntry {
    value: Box<dyn Any + Send + Sync>,
    snapshot: serde_json::Value,
}

/// Producer outputs exposed to consumers outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// `producer/entity` → output, in registration order
    pub outputs: IndexMap<String, serde_json::Value>,
}

impl Manifest {
    /// Output of `producer` for `entity`, if present.
    pub fn get(&self, producer: &str, entity: &EntityId) -> Option<&serde_json::Value> {
        self.outputs.get(&manifest_key(producer, entity))
    }
}

fn manifest_key(producer: &str, entity: &EntityId) -> String {
    format!("{}/{}", producer, entity)
}

/// Shared state of one generation pass.
pub struct GenerationContext<'a> {
    schema: &'a Schema,
    grants: Grants,
    outputs: IndexMap<OutputKey, OutputEntry>,
    resources: Vec<ResourceDef>,
    addresses: HashSet<String>,
}

impl<'a> GenerationContext<'a> {
    /// Create a context over an already resolved schema and its grants.
    pub fn new(schema: &'a Schema, grants: Grants) -> Self {
        Self {
            schema,
            grants,
            outputs: IndexMap::new(),
            resources: Vec::new(),
            addresses: HashSet::new(),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Aggregated grants for a lambda (empty when none were computed).
    pub fn grants_for(&self, lambda: &str) -> BTreeSet<Permission> {
        self.grants.get(lambda).cloned().unwrap_or_default()
    }

    /// Whether `P` has registered output for `entity`.
    pub fn check<P: Producer>(&self, entity: &EntityId) -> bool {
        self.outputs.contains_key(&OutputKey {
            producer: ProducerId::of::<P>(),
            entity: entity.clone(),
        })
    }

    /// Output of `P` for `entity`. Absence is an ordering bug.
    pub fn get<P: Producer>(&self, entity: &EntityId) -> Result<&P::Output, GenerationError> {
        let key = OutputKey {
            producer: ProducerId::of::<P>(),
            entity: entity.clone(),
        };
        let entry = self
            .outputs
            .get(&key)
            .ok_or_else(|| GenerationError::MissingOutput {
                producer: P::NAME,
                entity: entity.clone(),
            })?;
        entry
            .value
            .downcast_ref::<P::Output>()
            .ok_or_else(|| GenerationError::OutputTypeMismatch {
                producer: P::NAME,
                entity: entity.clone(),
            })
    }

    /// Register the output of `P` for `entity`.
    pub fn register<P: Producer>(
        &mut self,
        entity: &EntityId,
        output: P::Output,
    ) -> Result<(), GenerationError> {
        let snapshot = serde_json::to_value(&output).map_err(|e| GenerationError::Encode {
            producer: P::NAME,
            message: e.to_string(),
        })?;
        self.register_erased(ProducerId::of::<P>(), entity, Box::new(output), snapshot)
    }

    /// Register a type-erased output. A second registration for the same
    /// key is rejected.
    pub(crate) fn register_erased(
        &mut self,
        producer: ProducerId,
        entity: &EntityId,
        value: Box<dyn Any + Send + Sync>,
        snapshot: serde_json::Value,
    ) -> Result<(), GenerationError> {
        let key = OutputKey {
            producer,
            entity: entity.clone(),
        };
        if self.outputs.contains_key(&key) {
            return Err(GenerationError::DuplicateOutput {
                producer: producer.name(),
                entity: entity.clone(),
            });
        }
        self.outputs.insert(key, OutputEntry { value, snapshot });
        Ok(())
    }

    /// Append resources emitted by `producer` for `entity`. An address that
    /// is already taken fails the pass.
    pub(crate) fn append(
        &mut self,
        producer: &'static str,
        entity: &EntityId,
        resources: Vec<ResourceDef>,
    ) -> Result<(), GenerationError> {
        for resource in resources {
            let address = resource.address();
            if !self.addresses.insert(address.clone()) {
                return Err(GenerationError::DuplicateResource {
                    address,
                    producer,
                    entity: entity.clone(),
                });
            }
            self.resources.push(resource);
        }
        Ok(())
    }

    /// Resources emitted so far.
    pub fn resources(&self) -> &[ResourceDef] {
        &self.resources
    }

    /// Number of registered outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Consume the context, yielding the resource graph and the manifest.
    pub fn finish(self) -> (Vec<ResourceDef>, Manifest) {
        let outputs = self
            .outputs
            .into_iter()
            .map(|(key, entry)| (manifest_key(key.producer.name(), &key.entity), entry.snapshot))
            .collect();
        (self.resources, Manifest { outputs })
    }
}
