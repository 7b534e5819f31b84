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

//! This module contains the diagnostics (errors) that can be returned by the
//! validator, and the result types that collect them.

use miette::Diagnostic;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::ast::{EntityUID, PolicyID};
use crate::entities::conformance::err::EntityValidationError;

pub mod validation_errors;
pub use validation_errors::*;

/// Contains the result of policy validation. The result includes the list of
/// issues found by validation and whether validation succeeds. Validation
/// succeeds if there are no errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    validation_errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new `ValidationResult` with these errors.
    pub fn new(errors: impl IntoIterator<Item = ValidationError>) -> Self {
        Self {
            validation_errors: errors.into_iter().collect(),
        }
    }

    /// True when validation passes. There are no errors.
    pub fn validation_passed(&self) -> bool {
        self.validation_errors.is_empty()
    }

    /// Get an iterator over the errors found by the validator.
    pub fn validation_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.validation_errors.iter()
    }

    /// Errors found for one policy
    pub fn errors_for_policy<'a>(
        &'a self,
        policy_id: &'a PolicyID,
    ) -> impl Iterator<Item = &'a ValidationError> {
        self.validation_errors()
            .filter(move |err| err.policy_id() == policy_id)
    }

    /// Get an iterator over the errors, consuming the result
    pub fn into_errors(self) -> impl Iterator<Item = ValidationError> {
        self.validation_errors.into_iter()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyErrorRecord<'a> {
    policy_id: &'a PolicyID,
    message: String,
}

#[derive(Serialize)]
struct ResultRecord<T> {
    valid: bool,
    errors: Vec<T>,
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ResultRecord {
            valid: self.validation_passed(),
            errors: self
                .validation_errors()
                .map(|err| PolicyErrorRecord {
                    policy_id: err.policy_id(),
                    message: err.to_string(),
                })
                .collect(),
        }
        .serialize(serializer)
    }
}

/// An error generated by the validator when it finds a potential problem in a
/// policy.
#[derive(Debug, Clone, Diagnostic, Error, Hash, Eq, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// A policy contains an entity type that is not declared in the schema.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnrecognizedEntityType(#[from] validation_errors::UnrecognizedEntityType),
    /// A policy contains an action that is not declared in the schema.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnrecognizedActionId(#[from] validation_errors::UnrecognizedActionId),
    /// No request can ever satisfy the policy
    #[error(transparent)]
    #[diagnostic(transparent)]
    ImpossiblePolicy(#[from] validation_errors::ImpossiblePolicy),
    /// The typechecker expected to see a subtype of one of the types in
    /// `expected`, but saw `actual`.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnexpectedType(#[from] validation_errors::UnexpectedType),
    /// An operator was applied to an operand of the wrong type
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidOperand(#[from] validation_errors::InvalidOperand),
    /// The typechecker could not compute a least upper bound for `types`.
    #[error(transparent)]
    #[diagnostic(transparent)]
    IncompatibleTypes(#[from] validation_errors::IncompatibleTypes),
    /// The typechecker detected an access to a record or entity attribute
    /// that it could not statically guarantee would be present.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnsafeAttributeAccess(#[from] validation_errors::UnsafeAttributeAccess),
    /// An attribute was read from an entity type the schema does not declare
    #[error(transparent)]
    #[diagnostic(transparent)]
    UndeclaredEntityTypeAccess(#[from] validation_errors::UndeclaredEntityTypeAccess),
    /// An attribute was read from something that has no attributes
    #[error(transparent)]
    #[diagnostic(transparent)]
    AttributeAccessOnNonRecord(#[from] validation_errors::AttributeAccessOnNonRecord),
    /// The typechecker found that a policy uses an extension function with
    /// the wrong number of arguments
    #[error(transparent)]
    #[diagnostic(transparent)]
    WrongNumberArguments(#[from] validation_errors::WrongNumberArguments),
    /// An extension constructor was given a literal it would reject
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidExtensionLiteral(#[from] validation_errors::InvalidExtensionLiteral),
    /// The policy accesses attributes deeper than the configured level
    #[error(transparent)]
    #[diagnostic(transparent)]
    EntityDerefLevelViolation(#[from] validation_errors::EntityDerefLevelViolation),
    /// Expression nesting exceeded what the validator can walk
    #[error(transparent)]
    #[diagnostic(transparent)]
    RecursionLimit(#[from] validation_errors::RecursionLimit),
}

impl ValidationError {
    /// Extract the policy id of the policy where the validator found the issue.
    pub fn policy_id(&self) -> &PolicyID {
        match self {
            Self::UnrecognizedEntityType(e) => &e.policy_id,
            Self::UnrecognizedActionId(e) => &e.policy_id,
            Self::ImpossiblePolicy(e) => &e.policy_id,
            Self::UnexpectedType(e) => &e.policy_id,
            Self::InvalidOperand(e) => &e.policy_id,
            Self::IncompatibleTypes(e) => &e.policy_id,
            Self::UnsafeAttributeAccess(e) => &e.policy_id,
            Self::UndeclaredEntityTypeAccess(e) => &e.policy_id,
            Self::AttributeAccessOnNonRecord(e) => &e.policy_id,
            Self::WrongNumberArguments(e) => &e.policy_id,
            Self::InvalidExtensionLiteral(e) => &e.policy_id,
            Self::EntityDerefLevelViolation(e) => &e.policy_id,
            Self::RecursionLimit(e) => &e.policy_id,
        }
    }

    /// Is this an impossible-policy diagnostic?
    pub fn is_impossible_policy(&self) -> bool {
        matches!(self, Self::ImpossiblePolicy(_))
    }
}

/// Result of validating a collection of entities. Every entity is checked,
/// and every problem found is reported.
#[derive(Debug, Default)]
pub struct EntityValidationResult {
    errors: Vec<EntityValidationError>,
}

impl EntityValidationResult {
    /// Collect entity validation errors
    pub fn new(errors: impl IntoIterator<Item = EntityValidationError>) -> Self {
        Self {
            errors: errors.into_iter().collect(),
        }
    }

    /// True when no entity had a problem
    pub fn validation_passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get an iterator over the errors found
    pub fn validation_errors(&self) -> impl Iterator<Item = &EntityValidationError> {
        self.errors.iter()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntityErrorRecord<'a> {
    entity_uid: &'a EntityUID,
    message: String,
}

impl Serialize for EntityValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ResultRecord {
            valid: self.validation_passed(),
            errors: self
                .validation_errors()
                .map(|err| EntityErrorRecord {
                    entity_uid: err.entity_uid(),
                    message: err.to_string(),
                })
                .collect(),
        }
        .serialize(serializer)
    }
}
