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

//! Checking a concrete request against the schema

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use super::Validator;
use crate::ast::Request;
use crate::entities::conformance::check_attributes;

impl Validator {
    /// Check that a request is one the schema allows: the action is declared,
    /// the principal and resource types are among those the action applies
    /// to, and the context matches the action's context record.
    ///
    /// Stops at the first problem, checking in that order.
    pub fn validate_request(&self, request: &Request) -> Result<(), RequestValidationError> {
        let action = request.action();
        let action_info = self.schema.get_action_id(action).ok_or_else(|| {
            request_validation_errors::UndeclaredActionError {
                action: action.clone(),
            }
        })?;
        let principal_ty = request.principal().entity_type();
        if !action_info.principal_types().contains(principal_ty) {
            return Err(request_validation_errors::InvalidPrincipalTypeError {
                principal_ty: principal_ty.clone(),
                action: action.clone(),
                valid_types: action_info.principal_types().to_vec(),
            }
            .into());
        }
        let resource_ty = request.resource().entity_type();
        if !action_info.resource_types().contains(resource_ty) {
            return Err(request_validation_errors::InvalidResourceTypeError {
                resource_ty: resource_ty.clone(),
                action: action.clone(),
                valid_types: action_info.resource_types().to_vec(),
            }
            .into());
        }
        if let Some(err) =
            check_attributes(request.context(), action_info.context(), self.options.mode)
                .into_iter()
                .next()
        {
            return Err(request_validation_errors::InvalidContextError {
                action: action.clone(),
                err,
            }
            .into());
        }
        debug!(%action, "validated request");
        Ok(())
    }
}

/// Error when the request does not conform to the schema.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[non_exhaustive]
pub enum RequestValidationError {
    /// Request action is not declared in the schema
    #[error(transparent)]
    #[diagnostic(transparent)]
    UndeclaredAction(#[from] request_validation_errors::UndeclaredActionError),
    /// Request principal is of a type that is not valid for the request
    /// action
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidPrincipalType(#[from] request_validation_errors::InvalidPrincipalTypeError),
    /// Request resource is of a type that is not valid for the request
    /// action
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidResourceType(#[from] request_validation_errors::InvalidResourceTypeError),
    /// Context does not comply with the shape specified for the request action
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidContext(#[from] request_validation_errors::InvalidContextError),
}

/// Errors related to request validation
pub mod request_validation_errors {
    use crate::ast::{EntityType, EntityUID};
    use crate::entities::conformance::err::AttributeConformanceError;
    use itertools::Itertools;
    use miette::Diagnostic;
    use thiserror::Error;

    /// `valid <kind> types for ...` help shared by principal and resource
    /// errors
    fn valid_types_help(
        kind: &str,
        action: &EntityUID,
        valid_types: &[EntityType],
    ) -> Box<dyn std::fmt::Display> {
        if valid_types.is_empty() {
            Box::new(format!("no {kind} types are valid for `{action}`"))
        } else {
            Box::new(format!(
                "valid {kind} types for `{action}`: {}",
                valid_types
                    .iter()
                    .sorted_unstable()
                    .map(|ty| format!("`{ty}`"))
                    .join(", ")
            ))
        }
    }

    /// Request action is not declared in the schema
    #[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
    #[error("request's action `{action}` is not declared in the schema")]
    pub struct UndeclaredActionError {
        /// Action which was not declared in the schema
        pub(super) action: EntityUID,
    }

    impl UndeclaredActionError {
        /// The action which was not declared in the schema
        pub fn action(&self) -> &EntityUID {
            &self.action
        }
    }

    /// Request principal is of a type that is not valid for the request
    /// action
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("principal type `{principal_ty}` is not valid for `{action}`")]
    pub struct InvalidPrincipalTypeError {
        /// Principal type which is not valid
        pub(super) principal_ty: EntityType,
        /// Action which it is not valid for
        pub(super) action: EntityUID,
        /// Principal types the action does apply to
        pub(super) valid_types: Vec<EntityType>,
    }

    impl Diagnostic for InvalidPrincipalTypeError {
        fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
            Some(valid_types_help(
                "principal",
                &self.action,
                &self.valid_types,
            ))
        }
    }

    impl InvalidPrincipalTypeError {
        /// The principal type which is not valid
        pub fn principal_ty(&self) -> &EntityType {
            &self.principal_ty
        }

        /// The action which it is not valid for
        pub fn action(&self) -> &EntityUID {
            &self.action
        }
    }

    /// Request resource is of a type that is not valid for the request
    /// action
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("resource type `{resource_ty}` is not valid for `{action}`")]
    pub struct InvalidResourceTypeError {
        /// Resource type which is not valid
        pub(super) resource_ty: EntityType,
        /// Action which it is not valid for
        pub(super) action: EntityUID,
        /// Resource types the action does apply to
        pub(super) valid_types: Vec<EntityType>,
    }

    impl Diagnostic for InvalidResourceTypeError {
        fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
            Some(valid_types_help("resource", &self.action, &self.valid_types))
        }
    }

    impl InvalidResourceTypeError {
        /// The resource type which is not valid
        pub fn resource_ty(&self) -> &EntityType {
            &self.resource_ty
        }

        /// The action which it is not valid for
        pub fn action(&self) -> &EntityUID {
            &self.action
        }
    }

    /// Context does not comply with the shape specified for the request action
    #[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
    #[error("context is not valid for `{action}`: {err}")]
    pub struct InvalidContextError {
        /// Action whose context record was violated
        pub(super) action: EntityUID,
        /// The first attribute found not to conform
        pub(super) err: AttributeConformanceError,
    }

    impl InvalidContextError {
        /// The action which the context is not valid for
        pub fn action(&self) -> &EntityUID {
            &self.action
        }

        /// What is wrong with the context
        pub fn attribute_error(&self) -> &AttributeConformanceError {
            &self.err
        }
    }
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{EntityUID, Value};
    use crate::entities::conformance::err::AttributeConformanceError;
    use crate::validator::{ValidationMode, ValidatorOptions};
    use cool_asserts::assert_matches;
    use serde_json::json;
    use similar_asserts::assert_eq;
    use smol_str::SmolStr;

    fn validator(mode: ValidationMode) -> Validator {
        Validator::from_json_value(
            json!({
                "entityTypes": { "User": {}, "Admin": {}, "Photo": {}, "Album": {} },
                "actions": {
                    "view": {
                        "appliesTo": {
                            "principalTypes": ["User", "Admin"],
                            "resourceTypes": ["Photo"],
                            "context": { "type": "Record", "attributes": {
                                "reason": { "type": "String" },
                                "urgent": { "type": "Boolean", "required": false }
                            } }
                        }
                    },
                    "share": {}
                }
            }),
            ValidatorOptions::default().with_mode(mode),
        )
        .unwrap_or_else(|e| panic!("{e}"))
    }

    fn request(
        principal: &str,
        action: &str,
        resource: &str,
        context: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Request {
        Request::new(
            EntityUID::new(principal, "p"),
            EntityUID::action(action),
            EntityUID::new(resource, "r"),
            context.into_iter().map(|(k, v)| (SmolStr::from(k), v)),
        )
    }

    #[test]
    fn valid_request() {
        let v = validator(ValidationMode::Strict);
        assert_eq!(
            v.validate_request(&request("User", "view", "Photo", [("reason", Value::from("audit"))])),
            Ok(())
        );
    }

    #[test]
    fn undeclared_action() {
        let v = validator(ValidationMode::Permissive);
        // the principal is also wrong, but the action is checked first
        let err = v
            .validate_request(&request("Album", "edit", "Photo", []))
            .err()
            .unwrap_or_else(|| panic!("request should be rejected"));
        assert_eq!(
            err.to_string(),
            r#"request's action `Action::"edit"` is not declared in the schema"#
        );
    }

    #[test]
    fn invalid_principal_and_resource() {
        let v = validator(ValidationMode::Permissive);
        let err = v
            .validate_request(&request("Album", "view", "Album", []))
            .err()
            .unwrap_or_else(|| panic!("request should be rejected"));
        assert_matches!(&err, RequestValidationError::InvalidPrincipalType(e) => {
            assert_eq!(e.principal_ty().as_str(), "Album");
        });
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("valid principal types for `Action::\"view\"`: `Admin`, `User`".to_string())
        );
        assert_matches!(
            v.validate_request(&request("Admin", "view", "Album", [])),
            Err(RequestValidationError::InvalidResourceType(_))
        );
        let err = v
            .validate_request(&request("User", "share", "Photo", []))
            .err()
            .unwrap_or_else(|| panic!("request should be rejected"));
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("no principal types are valid for `Action::\"share\"`".to_string())
        );
    }

    #[test]
    fn invalid_context() {
        let v = validator(ValidationMode::Permissive);
        let err = v
            .validate_request(&request("User", "view", "Photo", [("urgent", Value::from(true))]))
            .err()
            .unwrap_or_else(|| panic!("request should be rejected"));
        assert_eq!(
            err.to_string(),
            r#"context is not valid for `Action::"view"`: required attribute `reason` is missing"#
        );
        assert_matches!(
            v.validate_request(&request("User", "view", "Photo", [("reason", Value::from(1))])),
            Err(RequestValidationError::InvalidContext(e)) => {
                assert_matches!(e.attribute_error(), AttributeConformanceError::TypeMismatch { .. });
            }
        );
    }

    #[test]
    fn undeclared_context_attribute_in_strict_mode() {
        let context = [("reason", Value::from("audit")), ("extra", Value::from(1))];
        assert_eq!(
            validator(ValidationMode::Permissive)
                .validate_request(&request("User", "view", "Photo", context.clone())),
            Ok(())
        );
        assert_matches!(
            validator(ValidationMode::Strict)
                .validate_request(&request("User", "view", "Photo", context)),
            Err(RequestValidationError::InvalidContext(e)) => {
                assert_eq!(
                    e.attribute_error(),
                    &AttributeConformanceError::Unexpected { attr: "extra".into() }
                );
            }
        );
    }
}
