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

use super::EntityUID;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};

/// Concrete attribute values of entities and request contexts.
///
/// Extension values keep the text they were constructed from. The validator
/// only needs their kind, never their interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Long(i64),
    /// String
    String(SmolStr),
    /// Entity reference
    EntityUID(EntityUID),
    /// Set of values, possibly heterogeneous
    Set(Vec<Value>),
    /// Record keyed on attribute name
    Record(BTreeMap<SmolStr, Value>),
    /// `decimal` extension value
    Decimal(SmolStr),
    /// `ipaddr` extension value
    IpAddr(SmolStr),
    /// `datetime` extension value
    Datetime(SmolStr),
    /// `duration` extension value
    Duration(SmolStr),
}

impl Value {
    /// Create a record value
    pub fn record<K: Into<SmolStr>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Record(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create a set value
    pub fn set(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(elements.into_iter().collect())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Long(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<SmolStr> for Value {
    fn from(s: SmolStr) -> Self {
        Self::String(s)
    }
}

impl From<EntityUID> for Value {
    fn from(euid: EntityUID) -> Self {
        Self::EntityUID(euid)
    }
}

/// A concrete entity: its uid, attribute values and direct parents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    uid: EntityUID,
    attrs: BTreeMap<SmolStr, Value>,
    parents: BTreeSet<EntityUID>,
}

impl Entity {
    /// Create a new `Entity` with this UID, attributes, and parents.
    pub fn new(
        uid: EntityUID,
        attrs: impl IntoIterator<Item = (SmolStr, Value)>,
        parents: impl IntoIterator<Item = EntityUID>,
    ) -> Self {
        Self {
            uid,
            attrs: attrs.into_iter().collect(),
            parents: parents.into_iter().collect(),
        }
    }

    /// Create a new `Entity` with no attributes or parents
    pub fn with_uid(uid: EntityUID) -> Self {
        Self::new(uid, [], [])
    }

    /// Get the UID of this entity
    pub fn uid(&self) -> &EntityUID {
        &self.uid
    }

    /// Get the value for the given attribute, or `None` if not present
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    /// Attribute values of this entity
    pub fn attrs(&self) -> &BTreeMap<SmolStr, Value> {
        &self.attrs
    }

    /// Direct parents of this entity
    pub fn parents(&self) -> impl Iterator<Item = &EntityUID> {
        self.parents.iter()
    }
}

/// An authorization request to be checked against the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    principal: EntityUID,
    action: EntityUID,
    resource: EntityUID,
    context: BTreeMap<SmolStr, Value>,
}

impl Request {
    /// Build a request from its four components
    pub fn new(
        principal: EntityUID,
        action: EntityUID,
        resource: EntityUID,
        context: impl IntoIterator<Item = (SmolStr, Value)>,
    ) -> Self {
        Self {
            principal,
            action,
            resource,
            context: context.into_iter().collect(),
        }
    }

    /// The principal of the request
    pub fn principal(&self) -> &EntityUID {
        &self.principal
    }

    /// The action of the request
    pub fn action(&self) -> &EntityUID {
        &self.action
    }

    /// The resource of the request
    pub fn resource(&self) -> &EntityUID {
        &self.resource
    }

    /// The context record of the request
    pub fn context(&self) -> &BTreeMap<SmolStr, Value> {
        &self.context
    }
}
