//! # Condition Evaluator
//!
//! Evaluates step preconditions against live resource and location state.
//! Nothing is cached: every call re-reads the collaborators, so evaluating the
//! same condition twice against an unchanged workcell yields the same answer.

use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::{ConditionError, ConditionResult};
use crate::client::{LocationClient, ResourceClient};
use crate::models::{
    ChildKey, ComparisonOperator, Condition, Location, LocationRef, Resource, ResourcePresence,
    ResourceRef, Step,
};
use crate::scheduler::{BlockReason, SchedulerContext, SchedulerMetadata};

/// Evaluate a single condition.
///
/// `Ok(false)` means "not yet": the scheduler keeps waiting. An error means
/// the condition could not be evaluated at all.
pub async fn evaluate(
    condition: &Condition,
    resources: &dyn ResourceClient,
    locations: &dyn LocationClient,
) -> ConditionResult<bool> {
    match condition {
        Condition::ResourceInLocation(presence) => {
            let occupants = occupants(condition, presence, resources, locations).await?;
            Ok(occupants.iter().any(|resource| presence_matches(presence, resource)))
        }
        Condition::NoResourceInLocation(presence) => {
            let occupants = occupants(condition, presence, resources, locations).await?;
            Ok(!occupants.iter().any(|resource| presence_matches(presence, resource)))
        }
        Condition::ResourceFieldCheck {
            resource,
            field,
            operator,
            value,
        } => {
            let target = resolve_resource(condition, resource, resources, locations).await?;
            compare_field(condition, &target, field, *operator, value)
        }
        Condition::ResourceChildFieldCheck {
            resource,
            key,
            field,
            operator,
            value,
        } => {
            let parent = resolve_resource(condition, resource, resources, locations).await?;
            let child = resolve_child(condition, &parent, key)?;
            compare_field(condition, child, field, *operator, value)
        }
    }
}

/// Evaluate every precondition of a step in declared order, stopping at the
/// first one that is not satisfied.
#[instrument(skip(step, context), fields(step = %step.name, conditions = step.conditions.len()))]
pub async fn evaluate_all(step: &Step, context: &SchedulerContext) -> SchedulerMetadata {
    for (index, condition) in step.conditions.iter().enumerate() {
        let evaluated = index + 1;
        match evaluate(condition, context.resources.as_ref(), context.locations.as_ref()).await {
            Ok(true) => continue,
            Ok(false) => {
                debug!(index, condition = %condition, "Condition not met");
                return SchedulerMetadata::blocked(
                    BlockReason::ConditionNotMet {
                        index,
                        condition: condition.to_string(),
                    },
                    evaluated,
                );
            }
            Err(ConditionError::ServiceUnavailable { reason, .. }) => {
                return SchedulerMetadata::blocked(
                    BlockReason::ServiceUnavailable { error: reason },
                    evaluated,
                );
            }
            Err(err) => {
                debug!(index, error = %err, "Condition unresolvable");
                return SchedulerMetadata::blocked(
                    BlockReason::ConditionUnresolvable {
                        index,
                        error: err.to_string(),
                    },
                    evaluated,
                );
            }
        }
    }
    SchedulerMetadata::ready(step.conditions.len())
}

fn presence_matches(presence: &ResourcePresence, resource: &Resource) -> bool {
    resource.matches(
        presence.resource_id.as_deref(),
        presence.resource_class.as_deref(),
    )
}

async fn resolve_location(
    condition: &Condition,
    location: &LocationRef,
    locations: &dyn LocationClient,
) -> ConditionResult<Location> {
    match location {
        LocationRef::Id(id) => locations
            .get_location(id)
            .await
            .map_err(|err| ConditionError::from_client(condition, err)),
        LocationRef::Name(name) => locations
            .list_locations()
            .await
            .map_err(|err| ConditionError::from_client(condition, err))?
            .into_iter()
            .find(|candidate| &candidate.location_name == name)
            .ok_or_else(|| ConditionError::resolution(condition, format!("no location named '{name}'"))),
    }
}

async fn attached_resource(
    condition: &Condition,
    location: &Location,
    resources: &dyn ResourceClient,
) -> ConditionResult<Option<Resource>> {
    match &location.resource_id {
        Some(resource_id) => resources
            .get_resource(resource_id)
            .await
            .map(Some)
            .map_err(|err| ConditionError::from_client(condition, err)),
        None => Ok(None),
    }
}

/// Resources occupying a location: the children of a container location,
/// the single attached resource otherwise, or one child slot when keyed.
async fn occupants(
    condition: &Condition,
    presence: &ResourcePresence,
    resources: &dyn ResourceClient,
    locations: &dyn LocationClient,
) -> ConditionResult<Vec<Resource>> {
    let location = resolve_location(condition, &presence.location, locations).await?;
    let Some(attached) = attached_resource(condition, &location, resources).await? else {
        if presence.key.is_some() {
            return Err(ConditionError::resolution(
                condition,
                format!("{} has no container attached", presence.location),
            ));
        }
        return Ok(Vec::new());
    };

    match &presence.key {
        Some(key) => {
            if !attached.is_container() {
                return Err(ConditionError::resolution(
                    condition,
                    format!("resource {} is not a container", attached.resource_id),
                ));
            }
            Ok(attached.child(key).cloned().into_iter().collect())
        }
        None if attached.is_container() => {
            Ok(attached.children().into_iter().cloned().collect())
        }
        None => Ok(vec![attached]),
    }
}

async fn resolve_resource(
    condition: &Condition,
    reference: &ResourceRef,
    resources: &dyn ResourceClient,
    locations: &dyn LocationClient,
) -> ConditionResult<Resource> {
    match reference {
        ResourceRef::Id(resource_id) => resources
            .get_resource(resource_id)
            .await
            .map_err(|err| ConditionError::from_client(condition, err)),
        ResourceRef::Location { location, key } => {
            let resolved = resolve_location(condition, location, locations).await?;
            let attached = attached_resource(condition, &resolved, resources)
                .await?
                .ok_or_else(|| {
                    ConditionError::resolution(condition, format!("no resource at {location}"))
                })?;
            match key {
                Some(key) => resolve_child(condition, &attached, key).cloned(),
                None => Ok(attached),
            }
        }
    }
}

fn resolve_child<'a>(
    condition: &Condition,
    parent: &'a Resource,
    key: &ChildKey,
) -> ConditionResult<&'a Resource> {
    if !parent.is_container() {
        return Err(ConditionError::resolution(
            condition,
            format!("resource {} is not a container", parent.resource_id),
        ));
    }
    parent.child(key).ok_or_else(|| {
        ConditionError::resolution(
            condition,
            format!("resource {} has no child at [{key}]", parent.resource_id),
        )
    })
}

fn compare_field(
    condition: &Condition,
    resource: &Resource,
    field: &str,
    operator: ComparisonOperator,
    expected: &Value,
) -> ConditionResult<bool> {
    let actual = resource.field(field).ok_or_else(|| {
        ConditionError::resolution(
            condition,
            format!("resource {} has no field '{field}'", resource.resource_id),
        )
    })?;

    match (actual.as_f64(), expected.as_f64()) {
        (Some(lhs), Some(rhs)) => Ok(operator.compare_numbers(lhs, rhs)),
        _ if operator.is_ordering() => Err(ConditionError::resolution(
            condition,
            format!("operator {operator} needs numeric operands, got {actual} and {expected}"),
        )),
        _ => Ok(&actual == expected),
    }
}
