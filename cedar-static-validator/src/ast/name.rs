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

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr};

/// The entity type that Actions must have
pub static ACTION_ENTITY_TYPE: &str = "Action";

/// Separator between namespace components of a qualified name
pub static NAMESPACE_SEPARATOR: &str = "::";

/// A fully qualified entity type name, e.g. `PhotoApp::User`.
///
/// Names are stored as written after namespace qualification. No attempt is
/// made to check that the components are valid identifiers; the schema
/// parser and the policy parser are responsible for that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(SmolStr);

impl EntityType {
    /// Create an entity type from an already qualified name
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    /// The generic `Action` entity type of the empty namespace
    pub fn action() -> Self {
        Self(ACTION_ENTITY_TYPE.into())
    }

    /// Qualify a (possibly unqualified) name with `namespace`.
    ///
    /// Names that already contain `::` are considered qualified and returned
    /// unchanged, as are names in the empty namespace.
    pub fn qualify(namespace: &str, name: &str) -> Self {
        if namespace.is_empty() || name.contains(NAMESPACE_SEPARATOR) {
            Self(name.into())
        } else {
            Self(format!("{namespace}{NAMESPACE_SEPARATOR}{name}").into())
        }
    }

    /// Is this an Action entity type?
    /// Returns true for the exact name `Action` and for any name ending in
    /// `::Action`, regardless of namespace.
    pub fn is_action(&self) -> bool {
        self.basename() == ACTION_ENTITY_TYPE
    }

    /// The unqualified part of the name
    pub fn basename(&self) -> &str {
        match self.0.rsplit_once(NAMESPACE_SEPARATOR) {
            Some((_, base)) => base,
            None => &self.0,
        }
    }

    /// The namespace part of the name, empty for unqualified names
    pub fn namespace(&self) -> &str {
        match self.0.rsplit_once(NAMESPACE_SEPARATOR) {
            Some((ns, _)) => ns,
            None => "",
        }
    }

    /// The qualified name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Unique ID for an entity: its type plus an entity id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityUID {
    /// Type of the entity
    #[serde(rename = "type")]
    ty: EntityType,
    /// Id of the entity
    #[serde(rename = "id")]
    eid: SmolStr,
}

impl EntityUID {
    /// Build an `EntityUID` from its type and id
    pub fn new(ty: impl Into<EntityType>, eid: impl Into<SmolStr>) -> Self {
        Self {
            ty: ty.into(),
            eid: eid.into(),
        }
    }

    /// An action UID in the generic `Action` type
    pub fn action(eid: impl Into<SmolStr>) -> Self {
        Self::new(EntityType::action(), eid)
    }

    /// Get the type component
    pub fn entity_type(&self) -> &EntityType {
        &self.ty
    }

    /// Get the id component
    pub fn eid(&self) -> &str {
        &self.eid
    }
}

impl std::fmt::Display for EntityUID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::\"{}\"", self.ty, self.eid.escape_debug())
    }
}

/// Identifier for a policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyID(SmolStr);

impl PolicyID {
    /// Create a `PolicyID` from a string
    pub fn from_string(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_smolstr())
    }
}

impl std::fmt::Display for PolicyID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.escape_debug())
    }
}

impl AsRef<str> for PolicyID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
