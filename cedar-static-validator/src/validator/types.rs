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

//! Defines the type structure for typechecking and the lattice operations
//! (matching, unification, comparability) over it.

use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::ast::{EntityType, Value};

use super::{LubHelp, ValidatorSchema};

/// The main type structure.
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Serialize)]
pub enum Type {
    /// Booleans
    Bool,
    /// 64-bit signed integers
    Long,
    /// Strings
    String,
    /// An entity of the named type. The name need not be declared in the
    /// schema; undeclared names are reported where they are used.
    Entity(EntityType),
    /// An entity of some unspecified type
    AnyEntity,
    /// Homogeneous set of values of the element type
    Set(Box<Type>),
    /// Record with known attributes
    Record(RecordType),
    /// Extension types like `ipaddr`
    Extension(ExtensionName),
    /// A type we know nothing about. It matches every other type.
    Unknown,
    /// An attribute declared in the schema without a usable type. Matches
    /// like `Unknown` but may not be used as a condition.
    Unspecified,
}

impl Type {
    /// Construct a set type with the given element type
    pub fn set(element_type: Type) -> Type {
        Type::Set(Box::new(element_type))
    }

    /// Construct an entity type
    pub fn named_entity(name: impl Into<EntityType>) -> Type {
        Type::Entity(name.into())
    }

    /// Construct a closed record type where every attribute is required
    pub fn closed_record_with_required_attributes(
        attrs: impl IntoIterator<Item = (SmolStr, Type)>,
    ) -> Type {
        Type::Record(RecordType::new(
            Attributes::with_required_attributes(attrs),
            OpenTag::ClosedAttributes,
        ))
    }

    /// Construct a record type from attributes with explicit optionality
    pub fn record_with_attributes(
        attrs: impl IntoIterator<Item = (SmolStr, AttributeType)>,
        open_attributes: OpenTag,
    ) -> Type {
        Type::Record(RecordType::new(
            Attributes::with_attributes(attrs),
            open_attributes,
        ))
    }

    /// Is this `Unknown` or `Unspecified`?
    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown | Type::Unspecified)
    }

    /// Could a value of this type be an entity?
    pub(crate) fn may_be_entity(&self) -> bool {
        matches!(
            self,
            Type::Entity(_) | Type::AnyEntity | Type::Unknown | Type::Unspecified
        )
    }

    /// Is this a set, or a type that might be one?
    pub(crate) fn may_be_set(&self) -> bool {
        matches!(self, Type::Set(_) | Type::Unknown | Type::Unspecified)
    }

    /// Is this `ty`, or a type that might be `ty`?
    pub(crate) fn may_be(&self, ty: &Type) -> bool {
        self.is_unknown() || self == ty
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "Bool"),
            Type::Long => write!(f, "Long"),
            Type::String => write!(f, "String"),
            Type::Entity(name) => write!(f, "{name}"),
            Type::AnyEntity => write!(f, "__cedar::internal::AnyEntity"),
            Type::Set(element_type) => write!(f, "Set<{element_type}>"),
            Type::Record(record) => write!(f, "{record}"),
            Type::Extension(name) => write!(f, "{name}"),
            Type::Unknown => write!(f, "__cedar::internal::Unknown"),
            Type::Unspecified => write!(f, "__cedar::internal::Unspecified"),
        }
    }
}

/// The four extension types known to the validator
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtensionName {
    /// `decimal`
    Decimal,
    /// `ipaddr`
    Ipaddr,
    /// `datetime`
    Datetime,
    /// `duration`
    Duration,
}

impl ExtensionName {
    /// Look up an extension type by its schema name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "decimal" => Some(Self::Decimal),
            "ipaddr" => Some(Self::Ipaddr),
            "datetime" => Some(Self::Datetime),
            "duration" => Some(Self::Duration),
            _ => None,
        }
    }
}

impl Display for ExtensionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decimal => write!(f, "decimal"),
            Self::Ipaddr => write!(f, "ipaddr"),
            Self::Datetime => write!(f, "datetime"),
            Self::Duration => write!(f, "duration"),
        }
    }
}

/// Whether a record may carry attributes beyond the declared ones
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Copy, Clone, Serialize, Default)]
pub enum OpenTag {
    /// The attributes are open. A value of this type may have attributes other
    /// than those listed.
    OpenAttributes,
    /// The attributes are closed. The attributes for a value of this type must
    /// exactly match the attributes listed in the type.
    #[default]
    ClosedAttributes,
}

impl OpenTag {
    /// Are undeclared attributes allowed?
    pub fn is_open(self) -> bool {
        match self {
            OpenTag::OpenAttributes => true,
            OpenTag::ClosedAttributes => false,
        }
    }
}

impl From<bool> for OpenTag {
    fn from(open: bool) -> Self {
        if open {
            OpenTag::OpenAttributes
        } else {
            OpenTag::ClosedAttributes
        }
    }
}

/// Type of one attribute and whether it must be present
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeType {
    /// The type of the attribute
    pub attr_type: Type,
    /// True when the attribute must be present
    pub is_required: bool,
}

impl AttributeType {
    /// Construct an `AttributeType` with some type that may be required or
    /// optional as specified by the `is_required` parameter.
    pub fn new(attr_type: Type, is_required: bool) -> Self {
        Self {
            attr_type,
            is_required,
        }
    }

    /// Construct an `AttributeType` for an attribute that is required.
    pub fn required_attribute(attr_type: Type) -> Self {
        Self::new(attr_type, true)
    }

    /// Construct an `AttributeType` for an attribute that is optional.
    pub fn optional_attribute(attr_type: Type) -> Self {
        Self::new(attr_type, false)
    }

    /// Is the attribute required?
    pub fn is_required(&self) -> bool {
        self.is_required
    }
}

/// Attribute name to type mapping of a record or entity
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Serialize, Default)]
pub struct Attributes {
    attrs: BTreeMap<SmolStr, AttributeType>,
}

impl Attributes {
    /// Construct an `Attributes` with some required attributes.
    pub fn with_required_attributes(
        required_attrs: impl IntoIterator<Item = (SmolStr, Type)>,
    ) -> Self {
        Self::with_attributes(
            required_attrs
                .into_iter()
                .map(|(k, v)| (k, AttributeType::required_attribute(v))),
        )
    }

    /// Construct an `Attributes` with some attributes.
    pub fn with_attributes(attrs: impl IntoIterator<Item = (SmolStr, AttributeType)>) -> Self {
        Self {
            attrs: attrs.into_iter().collect(),
        }
    }

    /// Iterate over the attributes of this record with their types
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &AttributeType)> {
        self.attrs.iter()
    }

    /// Iterate over the attribute names
    pub fn keys(&self) -> impl Iterator<Item = &SmolStr> {
        self.attrs.keys()
    }

    /// Get the type of an attribute, if it is declared
    pub fn get_attr(&self, attr: &str) -> Option<&AttributeType> {
        self.attrs.get(attr)
    }

    /// Number of declared attributes
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Are there no declared attributes?
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl IntoIterator for Attributes {
    type Item = (SmolStr, AttributeType);
    type IntoIter = std::collections::btree_map::IntoIter<SmolStr, AttributeType>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.into_iter()
    }
}

impl FromIterator<(SmolStr, AttributeType)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (SmolStr, AttributeType)>>(iter: T) -> Self {
        Self::with_attributes(iter)
    }
}

/// A record type: its attributes and whether it is open
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Serialize, Default)]
pub struct RecordType {
    /// Declared attributes
    pub attrs: Attributes,
    /// Whether attributes other than the declared ones may appear
    pub open_attributes: OpenTag,
}

impl RecordType {
    /// Construct a record type
    pub fn new(attrs: Attributes, open_attributes: OpenTag) -> Self {
        Self {
            attrs,
            open_attributes,
        }
    }

    /// The empty open record, used where nothing is known about a record
    pub fn open() -> Self {
        Self::new(Attributes::default(), OpenTag::OpenAttributes)
    }

    /// Does this record tolerate undeclared attributes?
    pub fn is_open(&self) -> bool {
        self.open_attributes.is_open()
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_open() {
            write!(f, "__cedar::internal::OpenRecord")?;
        }
        write!(f, "{{")?;
        for (name, ty) in self.attrs.iter() {
            write!(f, "{name}")?;
            if !ty.is_required() {
                write!(f, "?")?;
            }
            write!(f, ": {},", ty.attr_type)?;
        }
        write!(f, "}}")
    }
}

/// One-directional structural compatibility: can a value of type `actual`
/// be used where `expected` is required?
pub fn types_match(expected: &Type, actual: &Type) -> bool {
    match (expected, actual) {
        (Type::Unknown | Type::Unspecified, _) | (_, Type::Unknown | Type::Unspecified) => true,
        (Type::Bool, Type::Bool) | (Type::Long, Type::Long) | (Type::String, Type::String) => true,
        (Type::Entity(e), Type::Entity(a)) => e == a,
        (Type::Entity(_) | Type::AnyEntity, Type::AnyEntity) => true,
        (Type::AnyEntity, Type::Entity(_)) => true,
        (Type::Set(e), Type::Set(a)) => types_match(e, a),
        (Type::Record(e), Type::Record(a)) => record_types_match(e, a),
        (Type::Extension(e), Type::Extension(a)) => e == a,
        _ => false,
    }
}

/// Every attribute of `expected` is present in `actual` with a matching type,
/// or is optional and absent. Extra attributes in `actual` are tolerated.
fn record_types_match(expected: &RecordType, actual: &RecordType) -> bool {
    expected
        .attrs
        .iter()
        .all(|(name, expected_attr)| match actual.attrs.get_attr(name) {
            Some(actual_attr) => types_match(&expected_attr.attr_type, &actual_attr.attr_type),
            None => !expected_attr.is_required(),
        })
}

/// Reconcile two types, e.g. of both branches of a conditional. `Unknown`
/// yields the other type; matching types yield the first; anything else
/// yields `Unknown`.
pub fn unify_types(t1: &Type, t2: &Type) -> Type {
    if matches!(t1, Type::Unknown) {
        t2.clone()
    } else if matches!(t2, Type::Unknown) || types_match(t1, t2) {
        t1.clone()
    } else {
        Type::Unknown
    }
}

/// Check whether two record types may be compared with each other. The
/// records are incompatible when a shared attribute has incompatible types,
/// or when either record is closed and declares an attribute the other lacks.
pub fn record_types_have_lub(r1: &RecordType, r2: &RecordType) -> Result<(), LubHelp> {
    for (name, a1) in r1.attrs.iter() {
        match r2.attrs.get_attr(name) {
            Some(a2) => {
                let compatible = match (&a1.attr_type, &a2.attr_type) {
                    (Type::Record(n1), Type::Record(n2)) => record_types_have_lub(n1, n2).is_ok(),
                    (t1, t2) => types_match(t1, t2) || types_match(t2, t1),
                };
                if !compatible {
                    return Err(LubHelp::AttributeType(name.clone()));
                }
            }
            None if r1.is_open() => (),
            None => return Err(LubHelp::RecordWidth(name.clone())),
        }
    }
    if let Some(name) = r2
        .attrs
        .keys()
        .find(|name| r1.attrs.get_attr(name).is_none())
    {
        if !r2.is_open() {
            return Err(LubHelp::RecordWidth(name.clone()));
        }
    }
    Ok(())
}

/// Coarse classes of types used to decide whether `==` and `!=` between two
/// operands is meaningful
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeCategory {
    /// Could be anything
    Unknown,
    /// Booleans
    Bool,
    /// Longs
    Long,
    /// Strings
    String,
    /// Entities
    Entity,
    /// Sets
    Set,
    /// Records
    Record,
    /// `decimal` values
    ExtDecimal,
    /// `ipaddr` values
    ExtIpaddr,
    /// `datetime` values
    ExtDatetime,
    /// `duration` values
    ExtDuration,
}

impl TypeCategory {
    /// Two operands are comparable when either category is `Unknown` or the
    /// categories are equal.
    pub fn comparable_with(self, other: TypeCategory) -> bool {
        self == TypeCategory::Unknown || other == TypeCategory::Unknown || self == other
    }
}

/// The comparability category of `ty`. Entity types that are neither an
/// action type nor declared in `schema` fall into `Unknown`.
pub fn type_category(ty: &Type, schema: &ValidatorSchema) -> TypeCategory {
    match ty {
        Type::Unknown | Type::Unspecified => TypeCategory::Unknown,
        Type::Bool => TypeCategory::Bool,
        Type::Long => TypeCategory::Long,
        Type::String => TypeCategory::String,
        Type::AnyEntity => TypeCategory::Entity,
        Type::Entity(name) if name.is_action() || schema.is_known_entity_type(name) => {
            TypeCategory::Entity
        }
        Type::Entity(_) => TypeCategory::Unknown,
        Type::Set(_) => TypeCategory::Set,
        Type::Record(_) => TypeCategory::Record,
        Type::Extension(ExtensionName::Decimal) => TypeCategory::ExtDecimal,
        Type::Extension(ExtensionName::Ipaddr) => TypeCategory::ExtIpaddr,
        Type::Extension(ExtensionName::Datetime) => TypeCategory::ExtDatetime,
        Type::Extension(ExtensionName::Duration) => TypeCategory::ExtDuration,
    }
}

/// Infer the type of a concrete value. Sets take the type of their first
/// element; records mark every attribute required.
pub fn infer_type(value: &Value) -> Type {
    match value {
        Value::Bool(_) => Type::Bool,
        Value::Long(_) => Type::Long,
        Value::String(_) => Type::String,
        Value::EntityUID(euid) => Type::Entity(euid.entity_type().clone()),
        Value::Set(elements) => Type::set(elements.first().map_or(Type::Unknown, infer_type)),
        Value::Record(attrs) => Type::closed_record_with_required_attributes(
            attrs.iter().map(|(k, v)| (k.clone(), infer_type(v))),
        ),
        Value::Decimal(_) => Type::Extension(ExtensionName::Decimal),
        Value::IpAddr(_) => Type::Extension(ExtensionName::Ipaddr),
        Value::Datetime(_) => Type::Extension(ExtensionName::Datetime),
        Value::Duration(_) => Type::Extension(ExtensionName::Duration),
    }
}
