//! CG-006: Fixed-point scheduler.
//!
//! Work items are `(producer, entity)` pairs. Each sweep offers every pending
//! item to its producer's readiness check; a ready item generates immediately,
//! so later items in the same sweep already observe its output. Sweeping
//! stops when nothing is pending. A sweep that completes nothing while items
//! remain is a stall: a cycle or a prerequisite that will never exist.

use super::context::GenerationContext;
use super::error::{GenerationError, StuckItem};
use super::producer::{DynProducer, Entity, Producer};

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Number of sweeps performed
    pub sweeps: usize,
    /// Number of work items completed
    pub completed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkState {
    Pending,
    Done,
}

struct WorkItem {
    producer: usize,
    entity: Entity,
    state: WorkState,
}

/// Drives registered producers to a fixed point.
#[derive(Default)]
pub struct Scheduler {
    producers: Vec<Box<dyn DynProducer>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer. Registration order only affects emission order.
    pub fn register<P: Producer>(&mut self, producer: P) -> &mut Self {
        self.producers.push(Box::new(producer));
        self
    }

    /// Builder form of [`Scheduler::register`].
    pub fn with<P: Producer>(mut self, producer: P) -> Self {
        self.register(producer);
        self
    }

    /// Names of the registered producers, in order.
    pub fn producer_names(&self) -> Vec<&'static str> {
        self.producers.iter().map(|p| p.id().name()).collect()
    }

    /// Run every work item to completion or fail with the stuck items.
    pub fn run(&self, ctx: &mut GenerationContext<'_>) -> Result<SweepReport, GenerationError> {
        let mut items: Vec<WorkItem> = Vec::new();
        for (index, producer) in self.producers.iter().enumerate() {
            for entity in producer.entities(ctx.schema()) {
                items.push(WorkItem {
                    producer: index,
                    entity,
                    state: WorkState::Pending,
                });
            }
        }

        let total = items.len();
        let mut completed = 0usize;
        let mut sweeps = 0usize;

        while completed < total {
            sweeps += 1;
            let before = completed;

            for item in items.iter_mut().filter(|i| i.state == WorkState::Pending) {
                let producer = &self.producers[item.producer];
                if !producer.may_run(&item.entity, ctx) {
                    continue;
                }

                let entity_id = item.entity.id();
                let generated = producer.generate_erased(&item.entity, ctx)?;
                tracing::trace!(
                    producer = producer.id().name(),
                    entity = %entity_id,
                    resources = generated.resources.len(),
                    "generated"
                );
                ctx.register_erased(producer.id(), &entity_id, generated.output, generated.snapshot)?;
                ctx.append(producer.id().name(), &entity_id, generated.resources)?;
                item.state = WorkState::Done;
                completed += 1;
            }

            tracing::debug!(sweep = sweeps, done = completed - before, pending = total - completed, "sweep finished");

            if completed == before {
                let stuck: Vec<StuckItem> = items
                    .iter()
                    .filter(|i| i.state == WorkState::Pending)
                    .map(|i| StuckItem {
                        producer: self.producers[i.producer].id().name(),
                        entity: i.entity.id(),
                    })
                    .collect();
                tracing::error!(stuck = stuck.len(), "generation stalled");
                return Err(GenerationError::Stalled { items: stuck });
            }
        }

        Ok(SweepReport { sweeps, completed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::producer::{EntityId, Generated};
    use crate::core::resource::ResourceDef;
    use crate::core::types::{LambdaSpec, Schema};
    use crate::permissions::Grants;

    fn schema() -> Schema {
        serde_yaml_ng::from_str(
            r#"
version: "1.0"
name: sched
lambdas:
  a:
    file: a.jar
    handler: A
"#,
        )
        .unwrap()
    }

    fn lambda_entity(schema: &Schema) -> Entity {
        let spec: LambdaSpec = schema.lambdas["a"].clone();
        Entity::Lambda {
            id: "a".to_string(),
            spec,
        }
    }

    fn lambda_key() -> EntityId {
        Entity::lambda_id("a")
    }

    // Chain: Third needs Second needs First.
    struct First;
    struct Second;
    struct Third;

    macro_rules! chained {
        ($ty:ident, $name:literal, $needs:expr) => {
            impl Producer for $ty {
                const NAME: &'static str = $name;
                type Output = String;
                fn entities(&self, schema: &Schema) -> Vec<Entity> {
                    vec![lambda_entity(schema)]
                }
                fn may_run(&self, _: &Entity, ctx: &GenerationContext<'_>) -> bool {
                    let needs: fn(&GenerationContext<'_>) -> bool = $needs;
                    needs(ctx)
                }
                fn generate(
                    &self,
                    entity: &Entity,
                    _: &GenerationContext<'_>,
                ) -> Result<Generated<String>, GenerationError> {
                    Ok(Generated::new(
                        $name.to_string(),
                        vec![ResourceDef::new($name, entity.id().to_string())],
                    ))
                }
            }
        };
    }

    chained!(First, "first", |_| true);
    chained!(Second, "second", |ctx| ctx.check::<First>(&lambda_key()));
    chained!(Third, "third", |ctx| ctx.check::<Second>(&lambda_key()));

    // Ping and Pong each wait for the other.
    struct Ping;
    struct Pong;

    chained!(Ping, "ping", |ctx| ctx.check::<Pong>(&lambda_key()));
    chained!(Pong, "pong", |ctx| ctx.check::<Ping>(&lambda_key()));

    #[test]
    fn test_cg006_in_order_single_sweep() {
        let schema = schema();
        let mut ctx = GenerationContext::new(&schema, Grants::new());
        let report = Scheduler::new()
            .with(First)
            .with(Second)
            .with(Third)
            .run(&mut ctx)
            .unwrap();
        assert_eq!(report, SweepReport { sweeps: 1, completed: 3 });
    }

    #[test]
    fn test_cg006_reverse_order_sweeps_equal_chain_length() {
        let schema = schema();
        let mut ctx = GenerationContext::new(&schema, Grants::new());
        let report = Scheduler::new()
            .with(Third)
            .with(Second)
            .with(First)
            .run(&mut ctx)
            .unwrap();
        assert_eq!(report.sweeps, 3);
        assert_eq!(report.completed, 3);
        let kinds: Vec<_> = ctx.resources().iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cg006_mutual_dependency_stalls() {
        let schema = schema();
        let mut ctx = GenerationContext::new(&schema, Grants::new());
        let err = Scheduler::new()
            .with(Ping)
            .with(Pong)
            .run(&mut ctx)
            .unwrap_err();
        match err {
            GenerationError::Stalled { items } => {
                let producers: Vec<_> = items.iter().map(|i| i.producer).collect();
                assert_eq!(producers, vec!["ping", "pong"]);
                assert!(items.iter().all(|i| i.entity == lambda_key()));
            }
            other => panic!("expected stall, got {:?}", other),
        }
        assert!(ctx.resources().is_empty());
    }

    #[test]
    fn test_cg006_stall_reports_only_stuck_items() {
        let schema = schema();
        let mut ctx = GenerationContext::new(&schema, Grants::new());
        let err = Scheduler::new()
            .with(First)
            .with(Ping)
            .with(Pong)
            .run(&mut ctx)
            .unwrap_err();
        match err {
            GenerationError::Stalled { items } => assert_eq!(items.len(), 2),
            other => panic!("expected stall, got {:?}", other),
        }
        assert!(ctx.check::<First>(&lambda_key()));
    }

    #[test]
    fn test_cg006_duplicate_producer_is_fatal() {
        let schema = schema();
        let mut ctx = GenerationContext::new(&schema, Grants::new());
        let err = Scheduler::new()
            .with(First)
            .with(First)
            .run(&mut ctx)
            .unwrap_err();
        assert!(matches!(err, GenerationError::DuplicateOutput { producer: "first", .. }));
    }

    #[test]
    fn test_cg006_empty_scheduler_completes() {
        let schema = schema();
        let mut ctx = GenerationContext::new(&schema, Grants::new());
        let report = Scheduler::new().run(&mut ctx).unwrap();
        assert_eq!(report, SweepReport { sweeps: 0, completed: 0 });
    }

    #[test]
    fn test_cg006_producer_names() {
        let s = Scheduler::new().with(First).with(Second);
        assert_eq!(s.producer_names(), vec!["first", "second"]);
    }
}
