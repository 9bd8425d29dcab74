//! CG-028: Custom domain alias for the API.

use super::deployment::DeploymentProducer;
use super::rest_api::RestApiProducer;
use super::schema_api;
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::Schema;
use serde::Serialize;

pub const CERTIFICATE_KIND: &str = "data.aws_acm_certificate";
pub const ZONE_KIND: &str = "data.aws_route53_zone";
pub const DOMAIN_KIND: &str = "aws_api_gateway_domain_name";
pub const MAPPING_KIND: &str = "aws_api_gateway_base_path_mapping";
pub const RECORD_KIND: &str = "aws_route53_record";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsOutput {
    pub fqdn: String,
}

pub struct DnsAliasProducer;

impl Producer for DnsAliasProducer {
    const NAME: &'static str = "dns_alias";
    type Output = DnsOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        schema
            .api
            .iter()
            .filter_map(|api| api.dns.clone())
            .map(Entity::Dns)
            .collect()
    }

    fn may_run(&self, _entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        ctx.schema().api.as_ref().is_some_and(|api| {
            ctx.check::<DeploymentProducer>(&Entity::Deployment(api.resolved_deployment()).id())
        })
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<DnsOutput>, GenerationError> {
        let Entity::Dns(dns) = entity else {
            return Err(Self::unexpected(entity));
        };
        let api = schema_api(ctx, Self::NAME, entity)?;
        let rest = ctx.get::<RestApiProducer>(&Entity::api_id(&api.name))?;
        let deployment =
            ctx.get::<DeploymentProducer>(&Entity::Deployment(api.resolved_deployment()).id())?;

        let fqdn = dns.fqdn();
        let name = names::tf(&[fqdn.as_str()]);
        let certificate_domain = dns.certificate_domain();

        let certificate = ResourceDef::new(CERTIFICATE_KIND, names::tf(&[certificate_domain.as_str()]))
            .field("domain", certificate_domain.as_str())
            .field("statuses", FieldValue::List(vec!["ISSUED".into()]));
        let zone = ResourceDef::new(ZONE_KIND, names::tf(&[dns.zone.as_str()]))
            .field("name", format!("{}.", dns.zone))
            .field("private_zone", false);
        let domain = ResourceDef::new(DOMAIN_KIND, name.as_str())
            .field("domain_name", fqdn.as_str())
            .field("certificate_arn", FieldValue::reference(certificate.attr("arn")));
        let mapping = ResourceDef::new(MAPPING_KIND, name.as_str())
            .field("api_id", FieldValue::reference(&rest.rest_api_id))
            .field("stage_name", deployment.stage_name.as_str())
            .field("domain_name", FieldValue::reference(domain.attr("domain_name")))
            .depends_on(deployment.deployment.as_str());
        let record = ResourceDef::new(RECORD_KIND, name.as_str())
            .field("zone_id", FieldValue::reference(zone.attr("zone_id")))
            .field("name", dns.alias.as_str())
            .field("type", "A")
            .field(
                "alias",
                FieldValue::map([
                    ("name", FieldValue::reference(domain.attr("cloudfront_domain_name"))),
                    ("zone_id", FieldValue::reference(domain.attr("cloudfront_zone_id"))),
                    ("evaluate_target_health", FieldValue::Bool(false)),
                ]),
            );

        Ok(Generated::new(
            DnsOutput { fqdn },
            vec![certificate, zone, domain, mapping, record],
        ))
    }
}
