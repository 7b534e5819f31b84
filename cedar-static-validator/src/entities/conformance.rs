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

use std::collections::BTreeMap;

use itertools::Itertools;
use smol_str::SmolStr;

use crate::ast::{Entity, EntityType, Value};
use crate::fuzzy_match::fuzzy_search;
use crate::validator::types::{infer_type, types_match, RecordType};
use crate::validator::{ValidationMode, ValidatorSchema};
pub mod err;

use err::{AttributeConformanceError, EntityValidationError, UnexpectedEntityTypeError};

/// Struct used to check whether entities conform to a schema
#[derive(Debug, Clone)]
pub struct EntitySchemaConformanceChecker<'a> {
    /// Schema to check conformance with
    schema: &'a ValidatorSchema,
    /// Strict mode also rejects undeclared attributes
    mode: ValidationMode,
}

impl<'a> EntitySchemaConformanceChecker<'a> {
    /// Create a new checker
    pub fn new(schema: &'a ValidatorSchema, mode: ValidationMode) -> Self {
        Self { schema, mode }
    }

    /// Validate an entity against the schema, returning every way in which
    /// it does not comply.
    pub fn validate_entity(&self, entity: &Entity) -> Vec<EntityValidationError> {
        let uid = entity.uid();
        let etype = uid.entity_type();
        // action entities are described by the action table, not by a shape
        if etype.is_action() {
            return Vec::new();
        }
        let Some(schema_etype) = self.schema.get_entity_type(etype) else {
            return vec![UnexpectedEntityTypeError {
                uid: uid.clone(),
                suggested_types: self.suggested_types(etype),
            }
            .into()];
        };
        let mut errors = check_attributes(entity.attrs(), &schema_etype.record_type(), self.mode)
            .into_iter()
            .map(|err| EntityValidationError::from_attribute(uid.clone(), err))
            .collect_vec();
        errors.extend(
            entity
                .parents()
                .map(|parent| parent.entity_type())
                .filter(|ancestor_ty| !schema_etype.member_of_types().contains(ancestor_ty))
                .unique()
                .map(|ancestor_ty| {
                    EntityValidationError::invalid_ancestor_type(uid.clone(), ancestor_ty.clone())
                }),
        );
        errors
    }

    /// Declared types with the same basename as `etype`; failing that, the
    /// closest declared type name
    fn suggested_types(&self, etype: &EntityType) -> Vec<EntityType> {
        let same_basename = self
            .schema
            .entity_type_names()
            .filter(|ty| ty.basename() == etype.basename())
            .cloned()
            .collect_vec();
        if !same_basename.is_empty() {
            return same_basename;
        }
        let names = self
            .schema
            .entity_type_names()
            .map(EntityType::as_str)
            .collect_vec();
        fuzzy_search(etype.as_str(), &names)
            .map(EntityType::new)
            .into_iter()
            .collect()
    }
}

/// Check a record of values against a declared record type. Required
/// attributes must be present, present attributes must have the declared
/// type, and in strict mode a closed record may not carry undeclared
/// attributes.
pub(crate) fn check_attributes(
    attrs: &BTreeMap<SmolStr, Value>,
    expected: &RecordType,
    mode: ValidationMode,
) -> Vec<AttributeConformanceError> {
    let mut errors = Vec::new();
    for (attr, attr_ty) in expected.attrs.iter() {
        match attrs.get(attr) {
            None if attr_ty.is_required() => {
                errors.push(AttributeConformanceError::Missing { attr: attr.clone() });
            }
            None => (),
            Some(value) => {
                let actual = infer_type(value);
                if !types_match(&attr_ty.attr_type, &actual) {
                    errors.push(AttributeConformanceError::TypeMismatch {
                        attr: attr.clone(),
                        expected: attr_ty.attr_type.clone(),
                        actual,
                    });
                }
            }
        }
    }
    if mode.is_strict() && !expected.is_open() {
        errors.extend(
            attrs
                .keys()
                .filter(|attr| expected.attrs.get_attr(attr).is_none())
                .map(|attr| AttributeConformanceError::Unexpected { attr: attr.clone() }),
        );
    }
    errors
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::EntityUID;
    use crate::validator::types::Type;
    use cool_asserts::assert_matches;
    use miette::Diagnostic;
    use serde_json::json;
    use similar_asserts::assert_eq;

    fn schema() -> ValidatorSchema {
        ValidatorSchema::from_json_value(json!({
            "App": {
                "entityTypes": {
                    "User": {
                        "memberOfTypes": ["Group"],
                        "shape": { "type": "Record", "attributes": {
                            "name": { "type": "String" },
                            "age": { "type": "Long" },
                            "nickname": { "type": "String", "required": false },
                            "friends": { "type": "Set", "element": { "type": "Entity", "name": "User" } }
                        } }
                    },
                    "Group": {}
                },
                "actions": { "view": {} }
            }
        }))
        .unwrap_or_else(|e| panic!("{e}"))
    }

    fn user(attrs: impl IntoIterator<Item = (&'static str, Value)>) -> Entity {
        Entity::new(
            EntityUID::new("App::User", "alice"),
            attrs.into_iter().map(|(k, v)| (SmolStr::from(k), v)),
            [EntityUID::new("App::Group", "admins")],
        )
    }

    fn alice() -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from("Alice")),
            ("age", Value::from(30)),
            ("friends", Value::set([Value::from(EntityUID::new("App::User", "bob"))])),
        ]
    }

    #[test]
    fn conforming_entity() {
        let schema = schema();
        let checker = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Strict);
        assert_eq!(checker.validate_entity(&user(alice())), vec![]);
        // groups declare no shape
        let group = Entity::new(
            EntityUID::new("App::Group", "admins"),
            [(SmolStr::from("anything"), Value::from(true))],
            [],
        );
        assert_eq!(checker.validate_entity(&group), vec![]);
    }

    #[test]
    fn missing_required_attribute() {
        let schema = schema();
        let checker = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Permissive);
        let errs = checker.validate_entity(&user([
            ("name", Value::from("Alice")),
            ("friends", Value::set([])),
        ]));
        assert_matches!(
            errs.as_slice(),
            [EntityValidationError::MissingRequiredEntityAttr(e)] => {
                assert_eq!(e.attr(), "age");
                assert_eq!(
                    e.to_string(),
                    r#"expected entity `App::User::"alice"` to have attribute `age`, but it does not"#
                );
            }
        );
    }

    #[test]
    fn type_mismatch() {
        let schema = schema();
        let checker = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Permissive);
        let mut attrs = alice();
        attrs.push(("nickname", Value::from(7)));
        assert_matches!(
            checker.validate_entity(&user(attrs)).as_slice(),
            [EntityValidationError::TypeMismatch(e)] => {
                assert_eq!(e.attr(), "nickname");
                assert_eq!(e.expected(), &Type::String);
                assert_eq!(e.actual(), &Type::Long);
            }
        );
    }

    #[test]
    fn undeclared_attribute_only_in_strict_mode() {
        let schema = schema();
        let mut attrs = alice();
        attrs.push(("shoeSize", Value::from(42)));
        let entity = user(attrs);
        let permissive = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Permissive);
        assert_eq!(permissive.validate_entity(&entity), vec![]);
        let strict = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Strict);
        assert_matches!(
            strict.validate_entity(&entity).as_slice(),
            [EntityValidationError::UnexpectedEntityAttr(e)] => assert_eq!(e.attr(), "shoeSize")
        );
    }

    #[test]
    fn invalid_ancestor() {
        let schema = schema();
        let checker = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Permissive);
        let group = Entity::new(
            EntityUID::new("App::Group", "admins"),
            [],
            [
                EntityUID::new("App::User", "alice"),
                EntityUID::new("App::User", "bob"),
            ],
        );
        assert_matches!(
            checker.validate_entity(&group).as_slice(),
            [EntityValidationError::InvalidAncestorType(e)] => {
                assert_eq!(e.ancestor_ty(), &EntityType::from("App::User"));
            }
        );
    }

    #[test]
    fn unexpected_entity_type() {
        let schema = schema();
        let checker = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Permissive);
        let err = checker
            .validate_entity(&Entity::with_uid(EntityUID::new("User", "alice")))
            .into_iter()
            .exactly_one()
            .unwrap_or_else(|errs| panic!("expected one error, got {:?}", errs.collect_vec()));
        assert_matches!(&err, EntityValidationError::UnexpectedEntityType(e) => {
            assert_eq!(e.suggested_types, vec![EntityType::from("App::User")]);
        });
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("did you mean `App::User`?".to_string())
        );
        let errs = checker.validate_entity(&Entity::with_uid(EntityUID::new("App::Grup", "g")));
        assert_matches!(errs.as_slice(), [EntityValidationError::UnexpectedEntityType(e)] => {
            assert_eq!(e.suggested_types, vec![EntityType::from("App::Group")]);
        });
    }

    #[test]
    fn actions() {
        let schema = schema();
        let checker = EntitySchemaConformanceChecker::new(&schema, ValidationMode::Strict);
        assert_eq!(
            checker.validate_entity(&Entity::with_uid(EntityUID::new("App::Action", "view"))),
            vec![]
        );
        // undeclared action ids and unknown parents are not checked either
        assert_eq!(
            checker.validate_entity(&Entity::new(
                EntityUID::new("App::Action", "edit"),
                [],
                [EntityUID::new("Nope", "n")]
            )),
            vec![]
        );
        assert_eq!(
            checker.validate_entity(&Entity::with_uid(EntityUID::action("edit"))),
            vec![]
        );
    }
}
