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

//! Structures defining the JSON syntax for Cedar schemas

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

use super::{schema_errors::JsonDeserializationError, SchemaError};

/// Annotations on schema elements. They are accepted and carried along, but
/// have no effect on validation.
pub type Annotations = BTreeMap<SmolStr, SmolStr>;

/// A [`Fragment`] is a map from namespace name to namespace definition. The
/// empty string is the empty namespace.
///
/// Two input layouts are accepted: the namespaced layout, and a flat layout
/// with `entityTypes` and/or `actions` at the top level, which is read as a
/// single definition of the empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(
    #[serde(with = "::serde_with::rust::maps_duplicate_key_is_error")]
    pub BTreeMap<SmolStr, NamespaceDefinition>,
);

impl Fragment {
    /// Read a fragment from JSON text, detecting the flat layout
    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        if src.trim().is_empty() {
            return Err(SchemaError::MissingSchema(Default::default()));
        }
        let value: serde_json::Value = serde_json::from_str(src)
            .map_err(|err| JsonDeserializationError::new(err, Some(src)))?;
        match value {
            serde_json::Value::Null => Err(SchemaError::MissingSchema(Default::default())),
            value if is_flat_layout(&value) => {
                // parse the text again so that duplicate keys are still caught
                let ns: NamespaceDefinition = serde_json::from_str(src)
                    .map_err(|err| JsonDeserializationError::new(err, Some(src)))?;
                Ok(Self::single_namespace(ns))
            }
            _ => serde_json::from_str(src)
                .map_err(|err| JsonDeserializationError::new(err, Some(src)).into()),
        }
    }

    /// Read a fragment from a JSON value, detecting the flat layout
    pub fn from_json_value(json: serde_json::Value) -> Result<Self, SchemaError> {
        match json {
            serde_json::Value::Null => Err(SchemaError::MissingSchema(Default::default())),
            json if is_flat_layout(&json) => {
                let ns: NamespaceDefinition = serde_json::from_value(json)
                    .map_err(|err| JsonDeserializationError::new(err, None))?;
                Ok(Self::single_namespace(ns))
            }
            json => serde_json::from_value(json)
                .map_err(|err| JsonDeserializationError::new(err, None).into()),
        }
    }

    fn single_namespace(ns: NamespaceDefinition) -> Self {
        Self(BTreeMap::from([(SmolStr::default(), ns)]))
    }

    /// Iterate over `(namespace, definition)` pairs
    pub fn namespaces(&self) -> impl Iterator<Item = (&SmolStr, &NamespaceDefinition)> {
        self.0.iter()
    }
}

/// Top-level `entityTypes` or `actions` keys mean the document is a bare
/// namespace definition rather than a map of namespaces.
fn is_flat_layout(json: &serde_json::Value) -> bool {
    match json {
        serde_json::Value::Object(obj) => {
            obj.contains_key("entityTypes") || obj.contains_key("actions")
        }
        _ => false,
    }
}

/// A single namespace definition from a Fragment.
/// This is composed of common types, entity types, and action definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDefinition {
    /// Named type aliases, resolved before entity types and actions
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[serde(with = "::serde_with::rust::maps_duplicate_key_is_error")]
    pub common_types: BTreeMap<SmolStr, TypeSpec>,
    /// Entity type declarations
    #[serde(default)]
    #[serde(with = "::serde_with::rust::maps_duplicate_key_is_error")]
    pub entity_types: BTreeMap<SmolStr, EntityTypeDef>,
    /// Action declarations
    #[serde(default)]
    #[serde(with = "::serde_with::rust::maps_duplicate_key_is_error")]
    pub actions: BTreeMap<SmolStr, ActionDef>,
    /// Annotations
    #[serde(default)]
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

/// Represents the full definition of an entity type in the schema.
/// Entity types describe the relationships in the entity store, including what
/// entities can be members of groups of what types, and what attributes
/// can/should be included on entities of each type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDef {
    /// Entities of this type may be members of entities of these types
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_of_types: Vec<SmolStr>,
    /// Attribute shape. When absent the entity type accepts any attributes.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<TypeSpec>,
    /// Tag type. Tags are not tracked by the validator.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TypeSpec>,
    /// Annotations
    #[serde(default)]
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

/// An action declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct ActionDef {
    /// Principal and resource types the action applies to
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<ApplySpec>,
    /// Context shape. Replaces any context given in `appliesTo`.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<TypeSpec>,
    /// Action groups this action belongs to
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_of: Option<Vec<ActionEntityUID>>,
    /// Action attributes. Accepted for compatibility; not used.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
    /// Annotations
    #[serde(default)]
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

/// The apply spec specifies what principals and resources an action can be used
/// with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct ApplySpec {
    /// Resource types that are valid for the action
    #[serde(default)]
    pub resource_types: Vec<SmolStr>,
    /// Principal types that are valid for the action
    #[serde(default)]
    pub principal_types: Vec<SmolStr>,
    /// Context type that this action expects
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<TypeSpec>,
}

/// Reference to an action in a `memberOf` list. Without a `type` the action
/// type of the enclosing namespace is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionEntityUID {
    /// Action id
    pub id: SmolStr,
    /// Action entity type
    #[serde(rename = "type")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<SmolStr>,
}

/// A type in the JSON schema syntax. `type` selects the variant and decides
/// which of the other fields are meaningful:
/// `Set` uses `element`, `Record` uses `attributes` and
/// `additionalAttributes`, `Entity`/`Extension`/`EntityOrCommon` use `name`.
/// Any other `type` names a common type or an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpec {
    /// Type name or kind
    #[serde(rename = "type")]
    #[serde(default)]
    pub type_name: SmolStr,
    /// Element type of a `Set`
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<TypeSpec>>,
    /// Attributes of a `Record`
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<SmolStr, TypeSpec>>,
    /// Name of an `Entity`, `Extension` or `EntityOrCommon` type
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<SmolStr>,
    /// Whether the attribute is required, when this type is the type of a
    /// record attribute. Defaults to `true`.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Whether a `Record` accepts undeclared attributes
    #[serde(default)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub additional_attributes: bool,
    /// Annotations
    #[serde(default)]
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl TypeSpec {
    /// A type given only by its name, e.g. `{"type": "Long"}`
    pub fn named(type_name: impl Into<SmolStr>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    /// Is an attribute of this type required?
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }
}
