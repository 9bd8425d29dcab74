//! CG-004: Producer contract.
//!
//! A producer maps one schema entity to a typed output and zero or more
//! resources. Producers hold no state; everything they need is read from the
//! [`GenerationContext`], including outputs published by other producers.
//!
//! `may_run` lets a producer declare its prerequisites ("output of X exists
//! for entity Y") without anyone hard-coding an execution order. The
//! scheduler calls `generate` at most once per `(producer, entity)` pair.

use super::context::GenerationContext;
use super::error::GenerationError;
use super::resource::ResourceDef;
use super::types::{
    ApiSpec, DeploymentSpec, DnsSpec, DynamicRoute, LambdaSpec, ScheduledEvent, Schema,
    StaticRoute, UriPath,
};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;

// ============================================================================
// Entities
// ============================================================================

/// Stable identity of a schema entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An element of the schema a producer can generate for.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Api(ApiSpec),
    ResourcePath(UriPath),
    Lambda { id: String, spec: LambdaSpec },
    DynamicRoute(DynamicRoute),
    StaticRoute(StaticRoute),
    Deployment(DeploymentSpec),
    Scheduled(ScheduledEvent),
    Dns(DnsSpec),
}

impl Entity {
    /// Identity used to key outputs. Unique across variants.
    pub fn id(&self) -> EntityId {
        match self {
            Self::Api(api) => Self::api_id(&api.name),
            Self::ResourcePath(path) => Self::path_id(path),
            Self::Lambda { id, .. } => Self::lambda_id(id),
            Self::DynamicRoute(r) => EntityId(format!("route:{} /{}", r.method, r.path)),
            Self::StaticRoute(r) => EntityId(format!("static:/{}", r.path)),
            Self::Deployment(d) => EntityId(format!(
                "deployment:{}",
                d.name.as_deref().unwrap_or_default()
            )),
            Self::Scheduled(e) => EntityId(format!("scheduled:{}", e.id)),
            Self::Dns(d) => EntityId(format!("dns:{}", d.fqdn())),
        }
    }

    pub fn api_id(name: &str) -> EntityId {
        EntityId(format!("api:{}", name))
    }

    pub fn path_id(path: &UriPath) -> EntityId {
        EntityId(format!("path:/{}", path))
    }

    pub fn lambda_id(id: &str) -> EntityId {
        EntityId(format!("lambda:{}", id))
    }

    /// Id of the schema's API entity, if the schema has one.
    pub fn schema_api_id(schema: &Schema) -> Option<EntityId> {
        schema.api.as_ref().map(|api| Self::api_id(&api.name))
    }
}

// ============================================================================
// Producer trait
// ============================================================================

/// Result of one generation step.
#[derive(Debug)]
pub struct Generated<T> {
    /// Typed output kept in the context
    pub output: T,
    /// Resources appended to the emitted graph
    pub resources: Vec<ResourceDef>,
}

impl<T> Generated<T> {
    pub fn new(output: T, resources: Vec<ResourceDef>) -> Self {
        Self { output, resources }
    }
}

/// A unit of generation logic.
pub trait Producer: Send + Sync + 'static {
    /// Stable producer name used in diagnostics and the output manifest.
    const NAME: &'static str;

    /// Output published for other producers.
    type Output: Serialize + Send + Sync + 'static;

    /// Entities this producer generates for.
    fn entities(&self, schema: &Schema) -> Vec<Entity>;

    /// Readiness predicate. Must not mutate anything.
    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool;

    /// Produce the output and resources for `entity`.
    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<Self::Output>, GenerationError>;

    /// Error for an entity of the wrong variant.
    fn unexpected(entity: &Entity) -> GenerationError
    where
        Self: Sized,
    {
        GenerationError::UnexpectedEntity {
            producer: Self::NAME,
            entity: entity.id(),
        }
    }
}

/// Identity of a producer implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProducerId {
    type_id: TypeId,
    name: &'static str,
}

impl ProducerId {
    pub fn of<P: Producer>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: P::NAME,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

// ============================================================================
// Type erasure
// ============================================================================

/// Output of a producer with its concrete type erased.
pub struct ErasedGenerated {
    pub output: Box<dyn Any + Send + Sync>,
    /// JSON snapshot of the output for the manifest
    pub snapshot: serde_json::Value,
    pub resources: Vec<ResourceDef>,
}

/// Object-safe view of a [`Producer`], used by the scheduler.
pub trait DynProducer: Send + Sync {
    fn id(&self) -> ProducerId;
    fn entities(&self, schema: &Schema) -> Vec<Entity>;
    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool;
    fn generate_erased(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<ErasedGenerated, GenerationError>;
}

impl<P: Producer> DynProducer for P {
    fn id(&self) -> ProducerId {
        ProducerId::of::<P>()
    }

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        Producer::entities(self, schema)
    }

    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        Producer::may_run(self, entity, ctx)
    }

    fn generate_erased(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<ErasedGenerated, GenerationError> {
        let generated = Producer::generate(self, entity, ctx)?;
        let snapshot =
            serde_json::to_value(&generated.output).map_err(|e| GenerationError::Encode {
                producer: P::NAME,
                message: e.to_string(),
            })?;
        Ok(ErasedGenerated {
            output: Box::new(generated.output),
            snapshot,
            resources: generated.resources,
        })
    }
}
