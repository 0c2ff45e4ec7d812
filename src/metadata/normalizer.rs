use super::associations::AssociationAccumulator;
use super::key_shape::KeyShape;
use super::model::{
    AssociationDescriptor, AssociationEnd, ConstraintRole, CsdlMetadata, EntityContainer,
    Multiplicity, ReferentialConstraint, SchemaSegment,
};
use crate::core::{AdapterError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

/// Top-level field holding the schema segments.
const DATA_SERVICES_FIELD: &str = "dataServices";

const SOURCE_ROLE_SUFFIX: &str = "_Source";
const TARGET_ROLE_SUFFIX: &str = "_Target";

lazy_static! {
    static ref COLLECTION_TYPE: Regex = Regex::new(r"^Collection\(([^)]*)\)$").unwrap();
}

/// Declared type of a navigation property, split into its parts.
struct NavigationTarget<'a> {
    is_collection: bool,
    short_name: &'a str,
}

impl<'a> NavigationTarget<'a> {
    fn parse(declared: &'a str) -> Self {
        let (is_collection, qualified) = match COLLECTION_TYPE.captures(declared).and_then(|c| c.get(1)) {
            Some(inner) => (true, inner.as_str()),
            None => (false, declared),
        };
        let short_name = qualified.rsplit('.').next().unwrap_or(qualified);
        Self {
            is_collection,
            short_name,
        }
    }
}

/// Relationship fields to write back onto one navigation property.
struct RoleAssignment {
    type_index: usize,
    nav_index: usize,
    relationship: String,
    from_role: String,
    to_role: String,
}

/// Turns the newer dialect's schema description into one the client's
/// metadata store accepts.
///
/// The newer dialect splits a schema across two segments and drops the
/// association graph altogether; both are reconstructed here. The
/// association accumulator lives for one call only.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataNormalizer;

impl MetadataNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a raw metadata payload fetched from `url`.
    pub fn normalize(&self, raw: JsonValue, url: &str) -> Result<CsdlMetadata> {
        if raw.get(DATA_SERVICES_FIELD).is_none_or(JsonValue::is_null) {
            return Err(AdapterError::MetadataShape {
                url: url.to_string(),
                reason: format!("response lacks '{}'", DATA_SERVICES_FIELD),
            });
        }
        let mut metadata: CsdlMetadata = serde_json::from_value(raw)?;

        merge_segments(&mut metadata.data_services.schema);

        if let Some(schema) = metadata.data_services.schema.first_mut() {
            consolidate_keys(schema);
            let associations = synthesize_associations(schema, url)?;
            event!(
                Level::DEBUG,
                namespace = %schema.namespace,
                entity_types = schema.entity_types().len(),
                associations = associations.len(),
                "metadata normalized"
            );
            publish_associations(schema, associations, url)?;
        }

        Ok(metadata)
    }
}

/// Fold the container-only segment into the real one.
fn merge_segments(segments: &mut Vec<SchemaSegment>) {
    if segments.len() > 1 {
        let second = segments.remove(1);
        segments[0].absorb(second);
    }
}

fn consolidate_keys(schema: &mut SchemaSegment) {
    for entity_type in schema.entity_type.iter_mut().flatten() {
        entity_type.key = entity_type.key.take().and_then(KeyShape::consolidate);
    }
}

/// Give every navigation property a relationship and roles, synthesizing one
/// association per unordered pair of types.
fn synthesize_associations(schema: &mut SchemaSegment, url: &str) -> Result<Vec<AssociationDescriptor>> {
    let mut accumulator = AssociationAccumulator::default();
    let mut assignments = Vec::new();

    for (type_index, entity_type) in schema.entity_types().iter().enumerate() {
        for (nav_index, navigation) in entity_type.navigation_property.iter().enumerate() {
            let target = NavigationTarget::parse(&navigation.type_name);
            // A collection-valued property makes the *other* type the many side.
            let (source_type, target_type) = if target.is_collection {
                (target.short_name, entity_type.name.as_str())
            } else {
                (entity_type.name.as_str(), target.short_name)
            };

            let association = accumulator.get_or_insert_with(source_type, target_type, || {
                build_association(schema, source_type, target_type, url)
            })?;

            let is_source = !target.is_collection;
            let source_role = association.source_role().to_string();
            let target_role = association.target_role().to_string();
            let (from_role, to_role) = if is_source {
                (source_role, target_role)
            } else {
                (target_role, source_role)
            };
            assignments.push(RoleAssignment {
                type_index,
                nav_index,
                relationship: format!("{}.{}", schema.namespace, association.name),
                from_role,
                to_role,
            });
        }
    }

    event!(
        Level::TRACE,
        navigation_properties = assignments.len(),
        associations = accumulator.len(),
        "association roles assigned"
    );
    if let Some(entity_types) = schema.entity_type.as_mut() {
        for assignment in assignments {
            let navigation = &mut entity_types[assignment.type_index].navigation_property[assignment.nav_index];
            navigation.relationship = Some(assignment.relationship);
            navigation.from_role = Some(assignment.from_role);
            navigation.to_role = Some(assignment.to_role);
        }
    }

    Ok(accumulator.into_associations())
}

fn build_association(
    schema: &SchemaSegment,
    source_type: &str,
    target_type: &str,
    url: &str,
) -> Result<AssociationDescriptor> {
    let target = schema
        .find_entity_type(target_type)
        .ok_or_else(|| AdapterError::MetadataShape {
            url: url.to_string(),
            reason: format!("navigation target type '{}' is not declared", target_type),
        })?;
    let key_refs = target.key_property_refs().to_vec();

    let name = format!("{}_{}", source_type, target_type);
    let source_role = format!("{}{}", name, SOURCE_ROLE_SUFFIX);
    let target_role = format!("{}{}", name, TARGET_ROLE_SUFFIX);
    let qualify = |short: &str| format!("{}.{}", schema.namespace, short);
    let entity_set = |short: &str| {
        schema
            .entity_container
            .as_ref()
            .and_then(|container| container.entity_set_for(&qualify(short)))
            .map(str::to_string)
    };

    Ok(AssociationDescriptor {
        association: name.clone(),
        end: [
            AssociationEnd {
                entity_set: entity_set(source_type),
                multiplicity: Multiplicity::Many,
                role: source_role.clone(),
                type_name: qualify(source_type),
            },
            AssociationEnd {
                entity_set: entity_set(target_type),
                multiplicity: Multiplicity::One,
                role: target_role.clone(),
                type_name: qualify(target_type),
            },
        ],
        referential_constraint: ReferentialConstraint {
            dependent: ConstraintRole {
                property_ref: key_refs.clone(),
                role: source_role,
            },
            principal: ConstraintRole {
                property_ref: key_refs,
                role: target_role,
            },
        },
        name,
    })
}

/// Associations must be reachable from the schema and from the container.
fn publish_associations(
    schema: &mut SchemaSegment,
    associations: Vec<AssociationDescriptor>,
    url: &str,
) -> Result<()> {
    if associations.is_empty() && schema.entity_container.is_none() {
        schema.association = Some(associations);
        return Ok(());
    }
    let container: &mut EntityContainer =
        schema
            .entity_container
            .as_mut()
            .ok_or_else(|| AdapterError::MetadataShape {
                url: url.to_string(),
                reason: "schema declares navigation properties but no entity container".to_string(),
            })?;
    container.association_set = associations.clone();
    schema.association = Some(associations);
    Ok(())
}
