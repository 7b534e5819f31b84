/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Defines structures for entity type and action id information used by the
//! validator. The contents of these structures are populated from one or more
//! schema fragments: names are qualified with their namespace, common types
//! are inlined, and undeclared references are checked.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use nonempty::NonEmpty;
use serde::Serialize;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::ast::{EntityType, EntityUID, ACTION_ENTITY_TYPE};

use super::json_schema::{self, Fragment, TypeSpec};
use super::types::{AttributeType, Attributes, ExtensionName, OpenTag, RecordType, Type};

pub(crate) mod err;
use err::{schema_errors::*, Result};

/// Contains entity type information for use by the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityTypeInfo {
    /// The name of the entity type.
    name: EntityType,
    /// The attributes associated with this entity.
    attributes: Attributes,
    /// Entity types this type may be a direct member of
    member_of_types: Vec<EntityType>,
    /// Entity types without a declared shape accept any attributes
    open_attributes: OpenTag,
}

impl EntityTypeInfo {
    /// The name of the entity type
    pub fn name(&self) -> &EntityType {
        &self.name
    }

    /// Get the type of the attribute with the given name, if it exists
    pub fn attr(&self, attr: &str) -> Option<&AttributeType> {
        self.attributes.get_attr(attr)
    }

    /// All declared attributes
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Entity types this type may be a direct member of
    pub fn member_of_types(&self) -> &[EntityType] {
        &self.member_of_types
    }

    /// Whether undeclared attributes are permitted
    pub fn open_attributes(&self) -> OpenTag {
        self.open_attributes
    }

    /// The attributes of this entity type as a record type
    pub fn record_type(&self) -> RecordType {
        RecordType::new(self.attributes.clone(), self.open_attributes)
    }
}

/// Contains information about actions used by the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionTypeInfo {
    /// The name of the action.
    name: EntityUID,
    /// Principal types the action applies to, in declaration order
    principal_types: Vec<EntityType>,
    /// Resource types the action applies to, in declaration order
    resource_types: Vec<EntityType>,
    /// The type of the context record associated with this action.
    context: RecordType,
    /// Action groups this action is a direct member of
    member_of: Vec<EntityUID>,
}

impl ActionTypeInfo {
    /// The name of the action
    pub fn name(&self) -> &EntityUID {
        &self.name
    }

    /// Principal types the action applies to
    pub fn principal_types(&self) -> &[EntityType] {
        &self.principal_types
    }

    /// Resource types the action applies to
    pub fn resource_types(&self) -> &[EntityType] {
        &self.resource_types
    }

    /// The context record type. When the schema declares no context this is
    /// the empty open record.
    pub fn context(&self) -> &RecordType {
        &self.context
    }

    /// Action groups this action is a direct member of
    pub fn member_of(&self) -> &[EntityUID] {
        &self.member_of
    }
}

/// Internal representation of the schema for use by the validator.
///
/// The tables are filled once by [`ValidatorSchemaBuilder::build`] and never
/// change afterwards, so a schema can be shared freely between threads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidatorSchema {
    /// Map from entity type names to the [`EntityTypeInfo`] object.
    entity_types: BTreeMap<EntityType, EntityTypeInfo>,
    /// Map from action id names to the [`ActionTypeInfo`] object.
    action_ids: BTreeMap<EntityUID, ActionTypeInfo>,
    /// Resolved common types keyed on their qualified name
    common_types: BTreeMap<SmolStr, Type>,
}

impl ValidatorSchema {
    /// Start building a schema from one or more fragments
    pub fn builder() -> ValidatorSchemaBuilder {
        ValidatorSchemaBuilder::default()
    }

    /// Construct a [`ValidatorSchema`] from a JSON value in the appropriate
    /// shape.
    pub fn from_json_value(json: serde_json::Value) -> Result<Self> {
        Self::builder()
            .add_fragment(Fragment::from_json_value(json)?)
            .build()
    }

    /// Construct a [`ValidatorSchema`] directly from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::builder()
            .add_fragment(Fragment::from_json_str(json)?)
            .build()
    }

    /// Lookup the [`EntityTypeInfo`] for the given entity type
    pub fn get_entity_type(&self, entity_type: &EntityType) -> Option<&EntityTypeInfo> {
        self.entity_types.get(entity_type)
    }

    /// Lookup the [`ActionTypeInfo`] for the given action
    pub fn get_action_id(&self, action_id: &EntityUID) -> Option<&ActionTypeInfo> {
        self.action_ids.get(action_id)
    }

    /// Return true when the entity_type is declared in the schema
    pub fn is_known_entity_type(&self, entity_type: &EntityType) -> bool {
        self.entity_types.contains_key(entity_type)
    }

    /// Return true when the action id is declared in the schema
    pub fn is_known_action_id(&self, action_id: &EntityUID) -> bool {
        self.action_ids.contains_key(action_id)
    }

    /// An iterator over the entity types in the schema
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeInfo> {
        self.entity_types.values()
    }

    /// An iterator over the declared entity type names
    pub fn entity_type_names(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.keys()
    }

    /// An iterator over the actions in the schema
    pub fn action_ids(&self) -> impl Iterator<Item = &ActionTypeInfo> {
        self.action_ids.values()
    }

    /// Look up a resolved common type by its qualified name
    pub fn common_type(&self, name: &str) -> Option<&Type> {
        self.common_types.get(name)
    }

    /// Is there any action that applies to at least one principal type and
    /// at least one resource type? Without one, no policy can ever apply.
    pub fn has_applicable_action(&self) -> bool {
        self.action_ids()
            .any(|a| !a.principal_types.is_empty() && !a.resource_types.is_empty())
    }

    /// A name of the form `NS::` (non-empty namespace, empty base name) that
    /// is not a declared entity type. Such names come out of qualifying an
    /// empty type name inside a namespace.
    pub fn is_malformed_entity_type(&self, entity_type: &EntityType) -> bool {
        entity_type.basename().is_empty()
            && !entity_type.namespace().is_empty()
            && !self.is_known_entity_type(entity_type)
    }

    /// An action has a valid `appliesTo` when it names at least one principal
    /// type and one resource type, and not every one of them is malformed.
    pub fn has_valid_applies_to(&self, action: &ActionTypeInfo) -> bool {
        if action.principal_types.is_empty() || action.resource_types.is_empty() {
            return false;
        }
        let all_malformed =
            |types: &[EntityType]| types.iter().all(|ty| self.is_malformed_entity_type(ty));
        !(all_malformed(&action.principal_types) && all_malformed(&action.resource_types))
    }

    /// Can an entity of type `source` be a (transitive) member of an entity
    /// of type `target` according to `memberOfTypes`? Entity types missing
    /// from the schema have no outgoing edges.
    pub fn can_be_descendant_of(&self, source: &EntityType, target: &EntityType) -> bool {
        self.reaches(source, target, &mut HashSet::new())
    }

    fn reaches(
        &self,
        source: &EntityType,
        target: &EntityType,
        visited: &mut HashSet<EntityType>,
    ) -> bool {
        if !visited.insert(source.clone()) {
            return false;
        }
        let Some(info) = self.get_entity_type(source) else {
            return false;
        };
        info.member_of_types
            .iter()
            .any(|parent| parent == target || self.reaches(parent, target, visited))
    }

    /// Actions that are `group` itself or a transitive member of `group`,
    /// restricted to declared actions
    pub fn actions_in<'a>(&'a self, group: &'a EntityUID) -> impl Iterator<Item = &'a ActionTypeInfo> {
        self.action_ids().filter(move |action| {
            &action.name == group || self.action_is_member_of(&action.name, group, &mut HashSet::new())
        })
    }

    fn action_is_member_of(
        &self,
        action: &EntityUID,
        group: &EntityUID,
        visited: &mut HashSet<EntityUID>,
    ) -> bool {
        if !visited.insert(action.clone()) {
            return false;
        }
        let Some(info) = self.get_action_id(action) else {
            return false;
        };
        info.member_of
            .iter()
            .any(|parent| parent == group || self.action_is_member_of(parent, group, visited))
    }
}

/// Collects schema fragments and freezes them into a [`ValidatorSchema`]
#[derive(Debug, Default)]
pub struct ValidatorSchemaBuilder {
    fragments: Vec<Fragment>,
    allow_unknown_entity_types: bool,
}

impl ValidatorSchemaBuilder {
    /// Add a fragment. Fragments may reference each other's types.
    pub fn add_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Accept undeclared entity types in `memberOfTypes` and `appliesTo`
    /// lists and undeclared parent actions instead of failing. Policies using
    /// such types are then reported when they are validated.
    pub fn allow_unknown_entity_types(mut self, allow: bool) -> Self {
        self.allow_unknown_entity_types = allow;
        self
    }

    /// Resolve all types and check that the result is well formed
    pub fn build(self) -> Result<ValidatorSchema> {
        let mut resolver = TypeResolver::new(&self.fragments)?;

        let mut entity_types = BTreeMap::new();
        for (ns, def) in self.fragments.iter().flat_map(Fragment::namespaces) {
            for (name, entity_type) in &def.entity_types {
                let info = resolver.entity_type_info(ns, name, entity_type)?;
                let name = info.name.clone();
                if entity_types.insert(name.clone(), info).is_some() {
                    return Err(DuplicateEntityTypeError { ty: name }.into());
                }
            }
        }

        let mut action_ids = BTreeMap::new();
        for (ns, def) in self.fragments.iter().flat_map(Fragment::namespaces) {
            for (id, action) in &def.actions {
                let info = resolver.action_type_info(ns, id, action)?;
                let name = info.name.clone();
                if action_ids.insert(name.clone(), info).is_some() {
                    return Err(DuplicateActionError(name).into());
                }
            }
        }

        let common_types = resolver.finish()?;
        let schema = ValidatorSchema {
            entity_types,
            action_ids,
            common_types,
        };
        schema.check_declarations(self.allow_unknown_entity_types)?;
        debug!(
            entity_types = schema.entity_types.len(),
            actions = schema.action_ids.len(),
            common_types = schema.common_types.len(),
            "built validator schema"
        );
        Ok(schema)
    }
}

impl ValidatorSchema {
    /// Every entity type in a `memberOfTypes` or `appliesTo` list, and every
    /// parent action, must be declared.
    fn check_declarations(&self, allow_unknown_entity_types: bool) -> Result<()> {
        let undeclared_types = self
            .entity_types()
            .flat_map(|ety| ety.member_of_types.iter())
            .chain(
                self.action_ids()
                    .flat_map(|a| a.principal_types.iter().chain(a.resource_types.iter())),
            )
            .filter(|ty| !self.is_known_entity_type(ty))
            .unique()
            .cloned()
            .collect_vec();
        let undeclared_actions = self
            .action_ids()
            .flat_map(|a| a.member_of.iter())
            .filter(|uid| !self.is_known_action_id(uid))
            .unique()
            .cloned()
            .collect_vec();

        if allow_unknown_entity_types {
            if !undeclared_types.is_empty() || !undeclared_actions.is_empty() {
                warn!(
                    entity_types = %undeclared_types.iter().join(", "),
                    actions = %undeclared_actions.iter().join(", "),
                    "schema references undeclared names; accepting because unknown entity types are allowed"
                );
            }
            return Ok(());
        }
        if let Some(types) = NonEmpty::from_vec(undeclared_types) {
            return Err(UndeclaredEntityTypesError { types }.into());
        }
        if let Some(actions) = NonEmpty::from_vec(undeclared_actions) {
            return Err(ActionNotDefinedError(actions).into());
        }
        Ok(())
    }
}

/// Turns JSON type specifications into [`Type`]s. Common types are resolved
/// on first use so they may be declared in any order and in any namespace.
struct TypeResolver<'a> {
    /// Unresolved common type definitions keyed on qualified name, with the
    /// namespace they were declared in
    declared: BTreeMap<SmolStr, (&'a str, &'a TypeSpec)>,
    resolved: BTreeMap<SmolStr, Type>,
    in_progress: HashSet<SmolStr>,
}

impl<'a> TypeResolver<'a> {
    fn new(fragments: &'a [Fragment]) -> Result<Self> {
        let mut declared = BTreeMap::new();
        for (ns, def) in fragments.iter().flat_map(Fragment::namespaces) {
            for (name, spec) in &def.common_types {
                let qualified = SmolStr::from(EntityType::qualify(ns, name).as_str());
                if declared
                    .insert(qualified.clone(), (ns.as_str(), spec))
                    .is_some()
                {
                    return Err(DuplicateCommonTypeError { ty: qualified }.into());
                }
            }
        }
        Ok(Self {
            declared,
            resolved: BTreeMap::new(),
            in_progress: HashSet::new(),
        })
    }

    /// Resolve every declared common type, including unused ones, so that
    /// reference cycles are always reported.
    fn finish(mut self) -> Result<BTreeMap<SmolStr, Type>> {
        let names = self.declared.keys().cloned().collect_vec();
        for name in names {
            self.common_type(&name)?;
        }
        Ok(self.resolved)
    }

    fn common_type(&mut self, name: &str) -> Result<Option<Type>> {
        if let Some(ty) = self.resolved.get(name) {
            return Ok(Some(ty.clone()));
        }
        let Some((ns, spec)) = self.declared.get(name).copied() else {
            return Ok(None);
        };
        if !self.in_progress.insert(name.into()) {
            return Err(CycleInCommonTypeReferencesError { ty: name.into() }.into());
        }
        let ty = self.parse_type(spec, ns)?;
        self.in_progress.remove(name);
        self.resolved.insert(name.into(), ty.clone());
        Ok(Some(ty))
    }

    fn parse_type(&mut self, spec: &TypeSpec, ns: &str) -> Result<Type> {
        Ok(match spec.type_name.as_str() {
            "Boolean" | "Bool" => Type::Bool,
            "Long" => Type::Long,
            "String" => Type::String,
            "Entity" => match spec.name.as_deref() {
                Some(name) if !name.is_empty() => Type::Entity(EntityType::qualify(ns, name)),
                _ => Type::AnyEntity,
            },
            "Set" => Type::set(match &spec.element {
                Some(element) => self.parse_type(element, ns)?,
                None => Type::Unknown,
            }),
            "Record" => Type::Record(self.parse_record(spec, ns)?),
            "Extension" => spec
                .name
                .as_deref()
                .and_then(ExtensionName::parse)
                .map_or(Type::Unknown, Type::Extension),
            "EntityOrCommon" => match spec.name.as_deref() {
                Some(name) if !name.is_empty() => self.resolve_name(name, ns)?,
                _ => Type::Unspecified,
            },
            "" => Type::Unspecified,
            name => self.resolve_name(name, ns)?,
        })
    }

    fn parse_record(&mut self, spec: &TypeSpec, ns: &str) -> Result<RecordType> {
        let attrs = spec
            .attributes
            .iter()
            .flatten()
            .map(|(name, attr)| {
                let ty = self.parse_type(attr, ns)?;
                Ok((name.clone(), AttributeType::new(ty, attr.is_required())))
            })
            .collect::<Result<Attributes>>()?;
        Ok(RecordType::new(attrs, spec.additional_attributes.into()))
    }

    /// A bare type name is a common type if one is declared under the
    /// qualified name or, failing that, under the name as written. Otherwise
    /// it refers to an entity type, which may be declared later or not at all.
    fn resolve_name(&mut self, name: &str, ns: &str) -> Result<Type> {
        let qualified = EntityType::qualify(ns, name);
        if let Some(ty) = self.common_type(qualified.as_str())? {
            return Ok(ty);
        }
        if qualified.as_str() != name {
            if let Some(ty) = self.common_type(name)? {
                return Ok(ty);
            }
        }
        Ok(Type::Entity(qualified))
    }

    /// Must be a record type, or a reference to a common type that is one
    fn parse_record_like(&mut self, spec: &TypeSpec, ns: &str) -> Result<Option<RecordType>> {
        match self.parse_type(spec, ns)? {
            Type::Record(record) => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    fn entity_type_info(
        &mut self,
        ns: &str,
        name: &str,
        def: &json_schema::EntityTypeDef,
    ) -> Result<EntityTypeInfo> {
        let entity_type = EntityType::qualify(ns, name);
        let shape = match &def.shape {
            None => RecordType::open(),
            Some(shape) => match self.parse_record_like(shape, ns)? {
                Some(record) => record,
                None => {
                    return Err(ContextOrShapeNotRecordError {
                        ctx_or_shape: ContextOrShape::EntityTypeShape(entity_type),
                    }
                    .into())
                }
            },
        };
        Ok(EntityTypeInfo {
            member_of_types: qualify_all(ns, &def.member_of_types),
            attributes: shape.attrs,
            open_attributes: shape.open_attributes,
            name: entity_type,
        })
    }

    fn action_type_info(
        &mut self,
        ns: &str,
        id: &SmolStr,
        def: &json_schema::ActionDef,
    ) -> Result<ActionTypeInfo> {
        let name = EntityUID::new(EntityType::qualify(ns, ACTION_ENTITY_TYPE), id.clone());
        let applies_to = def.applies_to.as_ref();
        // an action-level context replaces the one declared in `appliesTo`
        let context_spec = def
            .context
            .as_ref()
            .or_else(|| applies_to.and_then(|a| a.context.as_ref()));
        let context = match context_spec {
            None => RecordType::open(),
            Some(spec) => match self.parse_record_like(spec, ns)? {
                Some(record) => record,
                None => {
                    return Err(ContextOrShapeNotRecordError {
                        ctx_or_shape: ContextOrShape::ActionContext(name),
                    }
                    .into())
                }
            },
        };
        let member_of = def
            .member_of
            .iter()
            .flatten()
            .map(|parent| {
                let ty = parent.ty.as_deref().unwrap_or(ACTION_ENTITY_TYPE);
                EntityUID::new(EntityType::qualify(ns, ty), parent.id.clone())
            })
            .unique()
            .collect();
        Ok(ActionTypeInfo {
            principal_types: applies_to
                .map(|a| qualify_all(ns, &a.principal_types))
                .unwrap_or_default(),
            resource_types: applies_to
                .map(|a| qualify_all(ns, &a.resource_types))
                .unwrap_or_default(),
            context,
            member_of,
            name,
        })
    }
}

/// Qualify every name with `ns`, dropping repeats but keeping the order of
/// first occurrence
fn qualify_all(ns: &str, names: &[SmolStr]) -> Vec<EntityType> {
    names
        .iter()
        .map(|name| EntityType::qualify(ns, name))
        .unique()
        .collect()
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[allow(clippy::indexing_slicing)]
#[cfg(test)]
mod test {
    use super::err::SchemaError;
    use super::*;
    use cool_asserts::assert_matches;
    use serde_json::json;

    #[track_caller]
    fn schema(json: serde_json::Value) -> ValidatorSchema {
        ValidatorSchema::from_json_value(json).unwrap_or_else(|e| panic!("bad schema: {e:?}"))
    }

    fn ety(name: &str) -> EntityType {
        EntityType::new(name)
    }

    #[test]
    fn flat_schema() {
        let schema = schema(json!({
            "entityTypes": {
                "User": { "memberOfTypes": ["Group"] },
                "Group": {},
                "Photo": {
                    "shape": {
                        "type": "Record",
                        "attributes": {
                            "owner": { "type": "Entity", "name": "User" },
                            "tags": { "type": "Set", "element": { "type": "String" } },
                            "private": { "type": "Boolean", "required": false }
                        }
                    }
                }
            },
            "actions": {
                "view": { "appliesTo": { "principalTypes": ["User"], "resourceTypes": ["Photo"] } }
            }
        }));
        let user = schema.get_entity_type(&ety("User")).unwrap_or_else(|| panic!("no User"));
        assert_eq!(user.member_of_types(), &[ety("Group")]);
        assert!(user.open_attributes().is_open());
        let photo = schema.get_entity_type(&ety("Photo")).unwrap_or_else(|| panic!("no Photo"));
        assert!(!photo.open_attributes().is_open());
        assert_eq!(
            photo.attr("owner"),
            Some(&AttributeType::required_attribute(Type::named_entity("User")))
        );
        assert_eq!(
            photo.attr("private"),
            Some(&AttributeType::optional_attribute(Type::Bool))
        );
        assert_eq!(
            photo.attr("tags"),
            Some(&AttributeType::required_attribute(Type::set(Type::String)))
        );
        let view = schema
            .get_action_id(&EntityUID::action("view"))
            .unwrap_or_else(|| panic!("no view"));
        assert_eq!(view.principal_types(), &[ety("User")]);
        assert_eq!(view.context(), &RecordType::open());
        assert!(schema.has_applicable_action());
    }

    #[test]
    fn namespaced_schema_qualifies_names() {
        let schema = schema(json!({
            "PhotoApp": {
                "entityTypes": {
                    "User": { "memberOfTypes": ["Group", "Group", "PhotoApp::Group"] },
                    "Group": {}
                },
                "actions": {
                    "view": {
                        "appliesTo": {
                            "principalTypes": ["User", "Group", "User"],
                            "resourceTypes": ["Other::Photo"]
                        }
                    },
                    "viewAll": {}
                }
            },
            "Other": { "entityTypes": { "Photo": {} }, "actions": {} }
        }));
        assert!(schema.is_known_entity_type(&ety("PhotoApp::User")));
        assert!(!schema.is_known_entity_type(&ety("User")));
        let user = schema
            .get_entity_type(&ety("PhotoApp::User"))
            .unwrap_or_else(|| panic!("no user"));
        assert_eq!(user.member_of_types(), &[ety("PhotoApp::Group")]);
        let view = schema
            .get_action_id(&EntityUID::new("PhotoApp::Action", "view"))
            .unwrap_or_else(|| panic!("no view"));
        assert_eq!(
            view.principal_types(),
            &[ety("PhotoApp::User"), ety("PhotoApp::Group")]
        );
        assert_eq!(view.resource_types(), &[ety("Other::Photo")]);
        let view_all = schema
            .get_action_id(&EntityUID::new("PhotoApp::Action", "viewAll"))
            .unwrap_or_else(|| panic!("no viewAll"));
        assert!(view_all.principal_types().is_empty());
        assert!(!schema.has_valid_applies_to(view_all));
    }

    #[test]
    fn common_types_in_any_order() {
        let schema = schema(json!({
            "NS": {
                "commonTypes": {
                    "A": { "type": "Set", "element": { "type": "B" } },
                    "B": { "type": "Record", "attributes": { "n": { "type": "Long" } } }
                },
                "entityTypes": {
                    "E": { "shape": { "type": "Record", "attributes": {
                        "a": { "type": "A" },
                        "f": { "type": "Forward" },
                        "e": { "type": "EntityOrCommon", "name": "B" },
                        "x": { "type": "Extension", "name": "ipaddr" },
                        "y": { "type": "Extension", "name": "nonsense" },
                        "z": { "type": "" }
                    } } }
                },
                "actions": {}
            }
        }));
        let b = Type::closed_record_with_required_attributes([("n".into(), Type::Long)]);
        assert_eq!(schema.common_type("NS::B"), Some(&b));
        let e = schema.get_entity_type(&ety("NS::E")).unwrap_or_else(|| panic!("no E"));
        let attr_type = |name: &str| e.attr(name).map(|a| a.attr_type.clone());
        assert_eq!(attr_type("a"), Some(Type::set(b.clone())));
        assert_eq!(attr_type("e"), Some(b));
        assert_eq!(attr_type("f"), Some(Type::named_entity("NS::Forward")));
        assert_eq!(attr_type("x"), Some(Type::Extension(ExtensionName::Ipaddr)));
        assert_eq!(attr_type("y"), Some(Type::Unknown));
        assert_eq!(attr_type("z"), Some(Type::Unspecified));
    }

    #[test]
    fn action_context_replaces_applies_to_context() {
        let schema = schema(json!({
            "entityTypes": { "User": {} },
            "actions": {
                "view": {
                    "context": { "type": "Record", "attributes": { "a": { "type": "Long" } } },
                    "appliesTo": {
                        "principalTypes": ["User"],
                        "resourceTypes": ["User"],
                        "context": { "type": "Record", "attributes": { "b": { "type": "Long" } } }
                    }
                }
            }
        }));
        let view = schema
            .get_action_id(&EntityUID::action("view"))
            .unwrap_or_else(|| panic!("no view"));
        assert!(view.context().attrs.get_attr("a").is_some());
        assert!(view.context().attrs.get_attr("b").is_none());
        assert!(!view.context().is_open());
    }

    #[test]
    fn undeclared_entity_types() {
        let src = json!({
            "entityTypes": { "User": { "memberOfTypes": ["Team"] } },
            "actions": {
                "view": { "appliesTo": { "principalTypes": ["User"], "resourceTypes": ["Doc"] } }
            }
        });
        assert_matches!(
            ValidatorSchema::from_json_value(src.clone()),
            Err(SchemaError::UndeclaredEntityTypes(e)) => {
                assert_eq!(e.types().collect_vec(), vec![&ety("Doc"), &ety("Team")]);
                assert_eq!(e.to_string(), "undeclared entity types: `Doc`, `Team`");
            }
        );
        let schema = ValidatorSchema::builder()
            .add_fragment(Fragment::from_json_value(src).unwrap_or_else(|e| panic!("{e}")))
            .allow_unknown_entity_types(true)
            .build();
        assert_matches!(schema, Ok(_));
    }

    #[test]
    fn undeclared_parent_action() {
        assert_matches!(
            ValidatorSchema::from_json_value(json!({
                "entityTypes": {},
                "actions": { "view": { "memberOf": [{ "id": "read" }] } }
            })),
            Err(SchemaError::ActionNotDefined(_))
        );
    }

    #[test]
    fn construction_errors() {
        assert_matches!(
            ValidatorSchema::from_json_value(serde_json::Value::Null),
            Err(SchemaError::MissingSchema(_))
        );
        assert_matches!(
            ValidatorSchema::from_json_str("not json"),
            Err(SchemaError::JsonDeserialization(_))
        );
        assert_matches!(
            ValidatorSchema::from_json_value(json!({
                "entityTypes": { "User": { "shape": { "type": "Long" } } },
                "actions": {}
            })),
            Err(SchemaError::ContextOrShapeNotRecord(_))
        );
        assert_matches!(
            ValidatorSchema::from_json_value(json!({
                "commonTypes": { "A": { "type": "B" }, "B": { "type": "A" } },
                "entityTypes": {},
                "actions": {}
            })),
            Err(SchemaError::CycleInCommonTypeReferences(_))
        );
        assert_matches!(
            ValidatorSchema::from_json_value(json!({
                "": { "entityTypes": { "NS::User": {} }, "actions": {} },
                "NS": { "entityTypes": { "User": {} }, "actions": {} }
            })),
            Err(SchemaError::DuplicateEntityType(_))
        );
    }

    #[test]
    fn descendants_with_cycle() {
        let schema = ValidatorSchema::builder()
            .add_fragment(
                Fragment::from_json_value(json!({
                    "entityTypes": {
                        "A": { "memberOfTypes": ["B"] },
                        "B": { "memberOfTypes": ["A"] },
                        "C": { "memberOfTypes": ["A", "Missing"] },
                        "D": {}
                    },
                    "actions": {}
                }))
                .unwrap_or_else(|e| panic!("{e}")),
            )
            .allow_unknown_entity_types(true)
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!schema.can_be_descendant_of(&ety("A"), &ety("D")));
        assert!(!schema.can_be_descendant_of(&ety("B"), &ety("C")));
        assert!(schema.can_be_descendant_of(&ety("C"), &ety("B")));
        assert!(schema.can_be_descendant_of(&ety("A"), &ety("A")));
        assert!(schema.can_be_descendant_of(&ety("C"), &ety("Missing")));
        assert!(!schema.can_be_descendant_of(&ety("Missing"), &ety("A")));
    }

    #[test]
    fn malformed_types() {
        let schema = ValidatorSchema::builder()
            .add_fragment(
                Fragment::from_json_value(json!({
                    "NS": {
                        "entityTypes": { "User": {} },
                        "actions": {
                            "bad": { "appliesTo": { "principalTypes": [""], "resourceTypes": [""] } },
                            "mixed": { "appliesTo": { "principalTypes": ["", "User"], "resourceTypes": [""] } }
                        }
                    }
                }))
                .unwrap_or_else(|e| panic!("{e}")),
            )
            .allow_unknown_entity_types(true)
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(schema.is_malformed_entity_type(&ety("NS::")));
        assert!(!schema.is_malformed_entity_type(&ety("NS::User")));
        assert!(!schema.is_malformed_entity_type(&ety("")));
        let bad = schema
            .get_action_id(&EntityUID::new("NS::Action", "bad"))
            .unwrap_or_else(|| panic!("no bad"));
        assert!(!schema.has_valid_applies_to(bad));
        let mixed = schema
            .get_action_id(&EntityUID::new("NS::Action", "mixed"))
            .unwrap_or_else(|| panic!("no mixed"));
        assert!(schema.has_valid_applies_to(mixed));
    }

    #[test]
    fn action_groups() {
        let schema = schema(json!({
            "entityTypes": {},
            "actions": {
                "read": {},
                "view": { "memberOf": [{ "id": "read" }] },
                "list": { "memberOf": [{ "id": "view", "type": "Action" }] },
                "write": {}
            }
        }));
        let read = EntityUID::action("read");
        let ids = schema
            .actions_in(&read)
            .map(|a| a.name().eid().to_string())
            .collect_vec();
        assert_eq!(ids, vec!["list", "read", "view"]);
    }
}
