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

//! Decoding of entities and request contexts from the Cedar JSON format.
//!
//! Entities are a JSON array:
//!
//! ```json
//! [{ "uid": { "type": "User", "id": "alice" },
//!    "attrs": { "manager": { "__entity": { "type": "User", "id": "bob" } },
//!               "ip": { "__extn": { "fn": "ip", "arg": "10.0.0.1" } } },
//!    "parents": [{ "type": "Group", "id": "admins" }] }]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::{Entity, EntityUID, Value};
use crate::validator::extensions::function_type;
use crate::validator::types::ExtensionName;

pub mod err;
use err::{JsonDeserializationError, JsonDeserializationErrorContext};

/// The canonical JSON representation of a Cedar value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CedarValueJson {
    /// The `__entity` escape introduces an entity reference
    EntityEscape {
        /// The entity referenced
        __entity: EntityUID,
    },
    /// The `__extn` escape introduces an extension value
    ExtnEscape {
        /// Constructor and argument
        __extn: FnAndArg,
    },
    /// JSON bool => Cedar bool
    Bool(bool),
    /// JSON int => Cedar long
    Long(i64),
    /// JSON string => Cedar string
    String(SmolStr),
    /// JSON list => Cedar set; can contain any `CedarValueJson`s, even
    /// heterogeneously
    Set(Vec<CedarValueJson>),
    /// JSON object => Cedar record
    Record(BTreeMap<SmolStr, CedarValueJson>),
    /// JSON null, which is never valid, but we put this here in order to
    /// provide a better error message.
    Null,
}

/// Structure expected by the `__extn` escape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FnAndArg {
    /// Extension constructor name
    #[serde(rename = "fn")]
    pub ext_fn: SmolStr,
    /// Argument to that constructor
    pub arg: Box<CedarValueJson>,
}

impl CedarValueJson {
    /// Convert this JSON value into a Cedar value. `ctx` says where the value
    /// came from, for error messages.
    pub fn into_value(
        self,
        ctx: &impl Fn() -> JsonDeserializationErrorContext,
    ) -> Result<Value, JsonDeserializationError> {
        match self {
            Self::Bool(b) => Ok(Value::Bool(b)),
            Self::Long(i) => Ok(Value::Long(i)),
            Self::String(s) => Ok(Value::String(s)),
            Self::EntityEscape { __entity } => Ok(Value::EntityUID(__entity)),
            Self::ExtnEscape { __extn } => __extn.into_value(ctx),
            Self::Set(elements) => Ok(Value::Set(
                elements
                    .into_iter()
                    .map(|v| v.into_value(ctx))
                    .collect::<Result<_, _>>()?,
            )),
            Self::Record(attrs) => Ok(Value::Record(
                attrs
                    .into_iter()
                    .map(|(k, v)| Ok((k, v.into_value(ctx)?)))
                    .collect::<Result<_, JsonDeserializationError>>()?,
            )),
            Self::Null => Err(JsonDeserializationError::null(ctx)),
        }
    }
}

impl FnAndArg {
    /// Build the extension value, checking the literal against the
    /// constructor's grammar
    pub fn into_value(
        self,
        ctx: &impl Fn() -> JsonDeserializationErrorContext,
    ) -> Result<Value, JsonDeserializationError> {
        // the type name is accepted as an alias of the `ip` constructor
        let name = match self.ext_fn.as_str() {
            "ipaddr" => "ip",
            name => name,
        };
        let Some((func, ext)) =
            function_type(name).and_then(|func| Some((func, func.constructed_type()?)))
        else {
            return Err(JsonDeserializationError::UnknownExtensionFunction {
                ctx: Box::new(ctx()),
                name: self.ext_fn,
            });
        };
        let CedarValueJson::String(arg) = *self.arg else {
            return Err(JsonDeserializationError::ExtnArgNotString {
                ctx: Box::new(ctx()),
                name: self.ext_fn,
            });
        };
        if let Err(reason) = func.check_literal(&arg) {
            return Err(JsonDeserializationError::InvalidExtensionLiteral {
                ctx: Box::new(ctx()),
                name: self.ext_fn,
                arg,
                reason,
            });
        }
        Ok(match ext {
            ExtensionName::Decimal => Value::Decimal(arg),
            ExtensionName::Ipaddr => Value::IpAddr(arg),
            ExtensionName::Datetime => Value::Datetime(arg),
            ExtensionName::Duration => Value::Duration(arg),
        })
    }
}

/// Serde JSON format for a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityJson {
    /// UID of the entity
    uid: EntityUID,
    /// Attributes of the entity. Duplicate keys are rejected.
    #[serde(default)]
    #[serde(with = "::serde_with::rust::maps_duplicate_key_is_error")]
    attrs: BTreeMap<SmolStr, CedarValueJson>,
    /// Direct parents of the entity
    #[serde(default)]
    parents: Vec<EntityUID>,
}

impl EntityJson {
    /// Decode the attribute values
    pub fn into_entity(self) -> Result<Entity, JsonDeserializationError> {
        let uid = self.uid;
        let attrs = self
            .attrs
            .into_iter()
            .map(|(attr, v)| {
                let value = v.into_value(&|| JsonDeserializationErrorContext::EntityAttribute {
                    uid: uid.clone(),
                    attr: attr.clone(),
                })?;
                Ok((attr, value))
            })
            .collect::<Result<Vec<_>, JsonDeserializationError>>()?;
        Ok(Entity::new(uid, attrs, self.parents))
    }
}

/// Decode entities from a JSON value
pub fn entities_from_json_value(
    json: serde_json::Value,
) -> Result<Vec<Entity>, JsonDeserializationError> {
    let ejsons: Vec<EntityJson> = serde_json::from_value(json)?;
    parse_ejsons(ejsons)
}

/// Decode entities from a JSON string
pub fn entities_from_json_str(json: &str) -> Result<Vec<Entity>, JsonDeserializationError> {
    let ejsons: Vec<EntityJson> = serde_json::from_str(json)?;
    parse_ejsons(ejsons)
}

fn parse_ejsons(ejsons: Vec<EntityJson>) -> Result<Vec<Entity>, JsonDeserializationError> {
    let entities = ejsons
        .into_iter()
        .map(EntityJson::into_entity)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(entities = entities.len(), "decoded entities");
    Ok(entities)
}

/// Decode a request context from a JSON value, which must be an object
pub fn context_from_json_value(
    json: serde_json::Value,
) -> Result<BTreeMap<SmolStr, Value>, JsonDeserializationError> {
    if !json.is_object() {
        return Err(JsonDeserializationError::ContextNotRecord {
            got: Box::new(json),
        });
    }
    match serde_json::from_value(json)? {
        CedarValueJson::Record(attrs) => attrs
            .into_iter()
            .map(|(k, v)| Ok((k, v.into_value(&|| JsonDeserializationErrorContext::Context)?)))
            .collect(),
        // an object holding only an escape is an entity or extension value
        other => Err(JsonDeserializationError::ContextNotRecord {
            got: Box::new(serde_json::to_value(other)?),
        }),
    }
}

/// Decode a request context from a JSON string
pub fn context_from_json_str(
    json: &str,
) -> Result<BTreeMap<SmolStr, Value>, JsonDeserializationError> {
    context_from_json_value(serde_json::from_str(json)?)
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;
    use serde_json::json;
    use similar_asserts::assert_eq;

    #[test]
    fn entity_with_every_kind_of_value() {
        let entities = entities_from_json_value(json!([{
            "uid": { "type": "App::User", "id": "alice" },
            "attrs": {
                "name": "Alice",
                "age": 30,
                "admin": false,
                "manager": { "__entity": { "type": "App::User", "id": "bob" } },
                "ip": { "__extn": { "fn": "ipaddr", "arg": "10.0.0.1" } },
                "since": { "__extn": { "fn": "datetime", "arg": "2024-10-15" } },
                "tags": ["a", "b"],
                "address": { "city": "Seattle" }
            },
            "parents": [{ "type": "App::Group", "id": "admins" }]
        }]))
        .unwrap_or_else(|e| panic!("{e}"));
        let [alice] = entities.as_slice() else {
            panic!("expected one entity, got {entities:?}");
        };
        assert_eq!(alice.uid(), &EntityUID::new("App::User", "alice"));
        assert_eq!(alice.get("age"), Some(&Value::Long(30)));
        assert_eq!(
            alice.get("manager"),
            Some(&Value::EntityUID(EntityUID::new("App::User", "bob")))
        );
        assert_eq!(alice.get("ip"), Some(&Value::IpAddr("10.0.0.1".into())));
        assert_eq!(alice.get("since"), Some(&Value::Datetime("2024-10-15".into())));
        assert_eq!(
            alice.get("address"),
            Some(&Value::record([("city", Value::from("Seattle"))]))
        );
        assert_eq!(
            alice.parents().collect::<Vec<_>>(),
            vec![&EntityUID::new("App::Group", "admins")]
        );
    }

    #[test]
    fn attrs_and_parents_default_to_empty() {
        let entities = entities_from_json_str(r#"[{"uid": {"type": "Group", "id": "g"}}]"#)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(entities, vec![Entity::with_uid(EntityUID::new("Group", "g"))]);
    }

    #[test]
    fn bad_extension_values() {
        let entity = |value: serde_json::Value| {
            entities_from_json_value(json!([{
                "uid": { "type": "User", "id": "alice" },
                "attrs": { "x": value }
            }]))
        };
        assert_matches!(
            entity(json!({ "__extn": { "fn": "lessThan", "arg": "1.0" } })),
            Err(JsonDeserializationError::UnknownExtensionFunction { name, .. }) => assert_eq!(name, "lessThan")
        );
        assert_matches!(
            entity(json!({ "__extn": { "fn": "decimal", "arg": 1 } })),
            Err(JsonDeserializationError::ExtnArgNotString { .. })
        );
        let err = entity(json!({ "__extn": { "fn": "decimal", "arg": "one" } }))
            .err()
            .unwrap_or_else(|| panic!("decimal literal should be rejected"));
        assert_matches!(&err, JsonDeserializationError::InvalidExtensionLiteral { .. });
        assert!(
            err.to_string().starts_with(r#"in attribute `x` on `User::"alice"`, invalid argument `one` to `decimal`"#),
            "{err}"
        );
        assert_matches!(entity(json!(null)), Err(JsonDeserializationError::Null(_)));
    }

    #[test]
    fn malformed_entities() {
        assert_matches!(
            entities_from_json_str("[{"),
            Err(JsonDeserializationError::Serde(_))
        );
        assert_matches!(
            entities_from_json_value(json!([{ "uid": { "type": "User", "id": "a" }, "shape": {} }])),
            Err(JsonDeserializationError::Serde(_))
        );
        assert_matches!(
            entities_from_json_str(
                r#"[{"uid": {"type": "User", "id": "a"}, "attrs": {"x": 1, "x": 2}}]"#
            ),
            Err(JsonDeserializationError::Serde(_))
        );
    }

    #[test]
    fn contexts() {
        let context = context_from_json_value(json!({
            "reason": "audit",
            "duration": { "__extn": { "fn": "duration", "arg": "1h30m" } }
        }))
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(context.get("reason"), Some(&Value::from("audit")));
        assert_eq!(context.get("duration"), Some(&Value::Duration("1h30m".into())));
        assert_matches!(
            context_from_json_str("[1, 2]"),
            Err(JsonDeserializationError::ContextNotRecord { .. })
        );
        assert_matches!(
            context_from_json_value(json!({ "__entity": { "type": "User", "id": "a" } })),
            Err(JsonDeserializationError::ContextNotRecord { .. })
        );
        let err = context_from_json_value(json!({ "x": null }))
            .err()
            .unwrap_or_else(|| panic!("null should be rejected"));
        assert_eq!(
            err.to_string(),
            "while parsing context, found a `null`; JSON `null`s are not allowed in Cedar"
        );
    }
}
