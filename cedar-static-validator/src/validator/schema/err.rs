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

use miette::Diagnostic;
use thiserror::Error;

/// Error when constructing a schema
//
// CAUTION: this type is publicly exported.
// Don't make fields `pub`, don't make breaking changes, and use caution
// when adding public methods.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// No schema was provided: the input was empty or JSON `null`
    #[error(transparent)]
    #[diagnostic(transparent)]
    MissingSchema(#[from] schema_errors::MissingSchemaError),
    /// This error is thrown when `serde_json` fails to deserialize the JSON
    #[error(transparent)]
    #[diagnostic(transparent)]
    JsonDeserialization(#[from] schema_errors::JsonDeserializationError),
    /// Undeclared entity type(s) used in the `memberOfTypes` field of an
    /// entity type or the `appliesTo` fields of an action. Entity types in
    /// the error message are fully qualified.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UndeclaredEntityTypes(#[from] schema_errors::UndeclaredEntityTypesError),
    /// An action named in the `memberOf` field of an action is not declared
    #[error(transparent)]
    #[diagnostic(transparent)]
    ActionNotDefined(#[from] schema_errors::ActionNotDefinedError),
    /// Duplicate specifications for an entity type
    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateEntityType(#[from] schema_errors::DuplicateEntityTypeError),
    /// Duplicate specifications for an action
    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateAction(#[from] schema_errors::DuplicateActionError),
    /// Duplicate specifications for a common type
    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateCommonType(#[from] schema_errors::DuplicateCommonTypeError),
    /// Cycle in common type references
    #[error(transparent)]
    #[diagnostic(transparent)]
    CycleInCommonTypeReferences(#[from] schema_errors::CycleInCommonTypeReferencesError),
    /// The schema file declared an entity shape or action context with a
    /// type other than `Record`
    #[error(transparent)]
    #[diagnostic(transparent)]
    ContextOrShapeNotRecord(#[from] schema_errors::ContextOrShapeNotRecordError),
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Error subtypes for [`SchemaError`]
pub mod schema_errors {
    use std::fmt::Display;

    use crate::ast::{EntityType, EntityUID};
    use itertools::Itertools;
    use miette::Diagnostic;
    use nonempty::NonEmpty;
    use smol_str::SmolStr;
    use thiserror::Error;

    /// Missing schema error
    #[derive(Debug, Default, Diagnostic, Error)]
    #[error("no schema was provided")]
    #[diagnostic(help("pass a JSON object with `entityTypes` and `actions`, or a map from namespace names to such objects"))]
    pub struct MissingSchemaError {}

    /// The schema JSON could not be deserialized
    #[derive(Debug, Error)]
    #[error("{err}")]
    pub struct JsonDeserializationError {
        /// Error thrown by the `serde_json` crate
        err: serde_json::Error,
        /// Possible fix for the error
        advice: Option<JsonDeserializationAdvice>,
    }

    impl Diagnostic for JsonDeserializationError {
        fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
            self.advice
                .as_ref()
                .map(|h| Box::new(h) as Box<dyn Display>)
        }
    }

    #[derive(Debug, Error)]
    enum JsonDeserializationAdvice {
        #[error("this API was expecting a schema in the JSON format; the input does not start with `{{`")]
        NotJson,
        #[error("a namespace definition may only contain `commonTypes`, `entityTypes`, `actions` and `annotations`")]
        NamespaceShape,
    }

    impl JsonDeserializationError {
        /// `err`: the `serde_json::Error` that was thrown
        ///
        /// `src`: the JSON that we were trying to deserialize (if available in string form)
        pub(crate) fn new(err: serde_json::Error, src: Option<&str>) -> Self {
            let advice = match src.map(|src| src.trim_start().chars().next()) {
                None | Some(None) => None,
                Some(Some('{')) => {
                    if err.is_data() && err.to_string().contains("unknown field") {
                        Some(JsonDeserializationAdvice::NamespaceShape)
                    } else {
                        None
                    }
                }
                Some(Some(_)) => Some(JsonDeserializationAdvice::NotJson),
            };
            Self { err, advice }
        }
    }

    /// Entity types referenced but never declared
    #[derive(Debug, Error)]
    pub struct UndeclaredEntityTypesError {
        /// Entity type(s) which were not declared
        pub(crate) types: NonEmpty<EntityType>,
    }

    impl UndeclaredEntityTypesError {
        /// The undeclared entity types, sorted
        pub fn types(&self) -> impl Iterator<Item = &EntityType> {
            self.types.iter().sorted_unstable()
        }
    }

    impl Display for UndeclaredEntityTypesError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            if self.types.len() == 1 {
                write!(f, "undeclared entity type: ")?;
            } else {
                write!(f, "undeclared entity types: ")?;
            }
            write!(f, "{}", self.types().map(|ty| format!("`{ty}`")).join(", "))
        }
    }

    impl Diagnostic for UndeclaredEntityTypesError {
        fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
            Some(Box::new("any entity types appearing in `memberOfTypes` or `appliesTo` need to be declared in `entityTypes`"))
        }
    }

    /// Action resolution error
    #[derive(Debug, Diagnostic, Error)]
    #[error("undeclared action{}: {}", if .0.len() > 1 { "s" } else { "" }, .0.iter().sorted_unstable().map(|a| format!("`{a}`")).join(", "))]
    #[diagnostic(help("any actions appearing as parents need to be declared as actions"))]
    pub struct ActionNotDefinedError(pub(crate) NonEmpty<EntityUID>);

    /// Duplicate entity type error
    #[derive(Debug, Diagnostic, Error)]
    #[error("duplicate entity type `{ty}`")]
    pub struct DuplicateEntityTypeError {
        pub(crate) ty: EntityType,
    }

    /// Duplicate action error
    #[derive(Debug, Diagnostic, Error)]
    #[error("duplicate action `{0}`")]
    pub struct DuplicateActionError(pub(crate) EntityUID);

    /// Duplicate common type error
    #[derive(Debug, Diagnostic, Error)]
    #[error("duplicate common type `{ty}`")]
    pub struct DuplicateCommonTypeError {
        pub(crate) ty: SmolStr,
    }

    /// Common types that refer to each other in a loop
    #[derive(Debug, Diagnostic, Error)]
    #[error("cycle in common type references containing `{ty}`")]
    pub struct CycleInCommonTypeReferencesError {
        pub(crate) ty: SmolStr,
    }

    /// A shape or context that is not a record
    #[derive(Debug, Error)]
    #[error("{ctx_or_shape} is declared with a type other than `Record`")]
    pub struct ContextOrShapeNotRecordError {
        pub(crate) ctx_or_shape: ContextOrShape,
    }

    impl Diagnostic for ContextOrShapeNotRecordError {
        fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
            match &self.ctx_or_shape {
                ContextOrShape::ActionContext(_) => {
                    Some(Box::new("action contexts must have type `Record`"))
                }
                ContextOrShape::EntityTypeShape(_) => {
                    Some(Box::new("entity type shapes must have type `Record`"))
                }
            }
        }
    }

    /// Describes in what action context or entity type shape a schema parsing
    /// error occurred.
    #[derive(Debug)]
    pub enum ContextOrShape {
        /// An error occurred when parsing the context for the action with this
        /// `EntityUID`.
        ActionContext(EntityUID),
        /// An error occurred when parsing the shape for the entity type.
        EntityTypeShape(EntityType),
    }

    impl std::fmt::Display for ContextOrShape {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ContextOrShape::ActionContext(action) => write!(f, "Context for action {action}"),
                ContextOrShape::EntityTypeShape(entity_type) => {
                    write!(f, "Shape for entity type {entity_type}")
                }
            }
        }
    }
}
