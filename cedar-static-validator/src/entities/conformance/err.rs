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

use crate::ast::{EntityType, EntityUID};
use crate::validator::types::Type;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised when entities do not conform to the schema
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[non_exhaustive]
pub enum EntityValidationError {
    /// Encountered attribute that shouldn't exist on entities of this type
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnexpectedEntityAttr(UnexpectedEntityAttr),
    /// Didn't encounter attribute that should exist
    #[error(transparent)]
    #[diagnostic(transparent)]
    MissingRequiredEntityAttr(MissingRequiredEntityAttr),
    /// The given attribute on the given entity had a different type than the
    /// schema indicated
    #[error(transparent)]
    #[diagnostic(transparent)]
    TypeMismatch(TypeMismatch),
    /// Found an ancestor of a type that's not allowed for that entity
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidAncestorType(InvalidAncestorType),
    /// Encountered an entity of a type which is not declared in the schema.
    /// Note that this error is only used for non-Action entity types.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnexpectedEntityType(#[from] UnexpectedEntityTypeError),
}

impl EntityValidationError {
    /// The entity the error is about
    pub fn entity_uid(&self) -> &EntityUID {
        match self {
            Self::UnexpectedEntityAttr(e) => &e.uid,
            Self::MissingRequiredEntityAttr(e) => &e.uid,
            Self::TypeMismatch(e) => &e.uid,
            Self::InvalidAncestorType(e) => &e.uid,
            Self::UnexpectedEntityType(e) => &e.uid,
        }
    }

    pub(crate) fn invalid_ancestor_type(uid: EntityUID, ancestor_type: EntityType) -> Self {
        Self::InvalidAncestorType(InvalidAncestorType {
            uid,
            ancestor_ty: Box::new(ancestor_type),
        })
    }

    /// Attach the entity to an attribute-level error
    pub(crate) fn from_attribute(uid: EntityUID, err: AttributeConformanceError) -> Self {
        match err {
            AttributeConformanceError::Missing { attr } => {
                Self::MissingRequiredEntityAttr(MissingRequiredEntityAttr { uid, attr })
            }
            AttributeConformanceError::Unexpected { attr } => {
                Self::UnexpectedEntityAttr(UnexpectedEntityAttr { uid, attr })
            }
            AttributeConformanceError::TypeMismatch {
                attr,
                expected,
                actual,
            } => Self::TypeMismatch(TypeMismatch {
                uid,
                attr,
                expected: Box::new(expected),
                actual: Box::new(actual),
            }),
        }
    }
}

/// Found an ancestor of a type that's not allowed for that entity
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error(
    "`{uid}` is not allowed to have an ancestor of type `{ancestor_ty}` according to the schema"
)]
pub struct InvalidAncestorType {
    /// Entity that has an invalid ancestor type
    uid: EntityUID,
    /// Ancestor type which was invalid
    ancestor_ty: Box<EntityType>,
}

impl InvalidAncestorType {
    /// The ancestor type which was invalid
    pub fn ancestor_ty(&self) -> &EntityType {
        &self.ancestor_ty
    }
}

/// Encountered attribute that shouldn't exist on entities of this type
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("attribute `{attr}` on `{uid}` should not exist according to the schema")]
pub struct UnexpectedEntityAttr {
    uid: EntityUID,
    attr: SmolStr,
}

impl UnexpectedEntityAttr {
    /// The undeclared attribute
    pub fn attr(&self) -> &SmolStr {
        &self.attr
    }
}

/// Didn't encounter attribute that should exist
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("expected entity `{uid}` to have attribute `{attr}`, but it does not")]
pub struct MissingRequiredEntityAttr {
    uid: EntityUID,
    attr: SmolStr,
}

impl MissingRequiredEntityAttr {
    /// The missing attribute
    pub fn attr(&self) -> &SmolStr {
        &self.attr
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("in attribute `{attr}` on `{uid}`, type mismatch: value was expected to have type {expected}, but it actually has type {actual}")]
/// The given attribute on the given entity had a different type than the
/// schema indicated
pub struct TypeMismatch {
    uid: EntityUID,
    attr: SmolStr,
    expected: Box<Type>,
    actual: Box<Type>,
}

impl TypeMismatch {
    /// The attribute with the wrong type
    pub fn attr(&self) -> &SmolStr {
        &self.attr
    }

    /// The declared type
    pub fn expected(&self) -> &Type {
        &self.expected
    }

    /// The type of the value found
    pub fn actual(&self) -> &Type {
        &self.actual
    }
}

/// Encountered an entity of a type which is not declared in the schema.
/// Note that this error is only used for non-Action entity types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entity `{uid}` has type `{}` which is not declared in the schema", .uid.entity_type())]
pub struct UnexpectedEntityTypeError {
    /// Entity that had the unexpected type
    pub uid: EntityUID,
    /// Suggested similar entity types that actually are declared in the schema (if any)
    pub suggested_types: Vec<EntityType>,
}

impl Diagnostic for UnexpectedEntityTypeError {
    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self.suggested_types.as_slice() {
            [] => None,
            [ty] => Some(Box::new(format!("did you mean `{ty}`?"))),
            tys => Some(Box::new(format!(
                "did you mean one of {:?}?",
                tys.iter().map(ToString::to_string).collect::<Vec<String>>()
            ))),
        }
    }
}

/// A record value (entity attributes or a request context) that does not
/// match its declared record type, without saying whose record it is
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum AttributeConformanceError {
    /// A required attribute is absent
    #[error("required attribute `{attr}` is missing")]
    Missing {
        /// Name of the attribute
        attr: SmolStr,
    },
    /// The value does not have the declared type
    #[error("attribute `{attr}` should have type {expected}, but has type {actual}")]
    TypeMismatch {
        /// Name of the attribute
        attr: SmolStr,
        /// Declared type
        expected: Type,
        /// Type of the value found
        actual: Type,
    },
    /// The attribute is not declared and the record is closed
    #[error("attribute `{attr}` is not declared in the schema")]
    Unexpected {
        /// Name of the attribute
        attr: SmolStr,
    },
}
