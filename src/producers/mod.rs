//! Resource producers: one module per infrastructure facet.
//!
//! Each producer turns one kind of schema entity into resources and a typed
//! output other producers can consume. The scheduler for a platform is the
//! ordered list of its producers.

pub mod api_resource;
pub mod azure;
pub mod cors;
pub mod deployment;
pub mod dns;
pub mod lambda;
pub mod rest_api;
pub mod route;
pub mod scheduled;
pub mod static_route;

use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::producer::Entity;
use crate::core::scheduler::Scheduler;
use crate::core::types::{ApiSpec, Platform};

/// Scheduler with every producer of `platform` registered.
pub fn scheduler_for(platform: Platform) -> Scheduler {
    match platform {
        Platform::Aws => Scheduler::new()
            .with(rest_api::RestApiProducer)
            .with(api_resource::ApiResourceProducer)
            .with(lambda::LambdaProducer)
            .with(route::DynamicRouteProducer)
            .with(static_route::StaticRouteProducer)
            .with(deployment::DeploymentProducer)
            .with(cors::CorsProducer)
            .with(scheduled::ScheduledProducer)
            .with(dns::DnsAliasProducer),
        Platform::Azure => Scheduler::new()
            .with(azure::FunctionAppProducer)
            .with(azure::HttpBindingProducer)
            .with(scheduled::ScheduledProducer),
    }
}

/// The schema's API, required by every route-level producer.
fn schema_api<'a>(
    ctx: &GenerationContext<'a>,
    producer: &'static str,
    entity: &Entity,
) -> Result<&'a ApiSpec, GenerationError> {
    ctx.schema()
        .api
        .as_ref()
        .ok_or_else(|| GenerationError::UnexpectedEntity {
            producer,
            entity: entity.id(),
        })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_for_aws_registers_all() {
        let names = scheduler_for(Platform::Aws).producer_names();
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "rest_api");
        assert!(names.contains(&"cors"));
        assert!(names.contains(&"deployment"));
    }

    #[test]
    fn test_scheduler_for_azure() {
        let names = scheduler_for(Platform::Azure).producer_names();
        assert_eq!(names, vec!["function_app", "http_binding", "scheduled"]);
    }
}
