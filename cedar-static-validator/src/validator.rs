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

//! Validator for Cedar policies, entities and requests

use crate::ast::{Entity, Policy, Request};
use crate::entities::conformance::EntitySchemaConformanceChecker;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

mod constant_fold;
mod diagnostics;
pub use diagnostics::*;
pub(crate) mod extensions;
pub mod json_schema;
mod rbac;
mod request;
pub use request::*;
mod schema;
pub use schema::err::*;
pub use schema::*;
mod typecheck;
use typecheck::{RequestEnv, Typechecker};
pub mod types;

/// Used to select how entities, contexts and requests are checked.
#[derive(Default, Eq, PartialEq, Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    /// Undeclared attributes are tolerated
    #[default]
    Permissive,
    /// Undeclared attributes on closed records are errors
    Strict,
}

impl ValidationMode {
    /// Does this mode apply strict validation rules.
    pub fn is_strict(self) -> bool {
        match self {
            ValidationMode::Strict => true,
            ValidationMode::Permissive => false,
        }
    }
}

/// Options fixed when a [`Validator`] is constructed.
///
/// Every field has a default, so an options document only needs to mention
/// what it changes:
///
/// ```json
/// { "maxAttributeLevel": 2, "mode": "strict" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ValidatorOptions {
    /// Longest chain of attribute accesses a policy may use. `0` means
    /// unlimited.
    max_attribute_level: u32,
    /// Entity, context and request checking mode
    mode: ValidationMode,
    /// Accept schemas that reference undeclared entity types
    allow_unknown_entity_types: bool,
}

impl ValidatorOptions {
    /// Limit attribute access chains to `level`; `0` lifts the limit
    pub fn with_max_attribute_level(mut self, level: u32) -> Self {
        self.max_attribute_level = level;
        self
    }

    /// Set the checking mode
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `with_mode(ValidationMode::Strict)` when `strict` holds
    pub fn with_strict_entity_validation(self, strict: bool) -> Self {
        self.with_mode(if strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Permissive
        })
    }

    /// Accept undeclared entity types when building the schema
    pub fn with_allow_unknown_entity_types(mut self, allow: bool) -> Self {
        self.allow_unknown_entity_types = allow;
        self
    }

    /// Read options from a JSON configuration document
    pub fn from_json_value(json: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(json)
    }

    /// Maximum attribute access level, `0` when unlimited
    pub fn max_attribute_level(&self) -> u32 {
        self.max_attribute_level
    }

    /// The checking mode
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Whether unknown entity types are accepted by the schema
    pub fn allow_unknown_entity_types(&self) -> bool {
        self.allow_unknown_entity_types
    }
}

/// Checks policies, entities and requests against one schema.
///
/// A `Validator` never changes after construction, so it may be shared
/// between threads and used for any number of validation calls.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: ValidatorSchema,
    options: ValidatorOptions,
}

impl Validator {
    /// Construct a new Validator from a schema with default options.
    pub fn new(schema: ValidatorSchema) -> Validator {
        Self::with_options(schema, ValidatorOptions::default())
    }

    /// Construct a new Validator from a schema. The
    /// `allow_unknown_entity_types` option has no effect here, since the
    /// schema is already built.
    pub fn with_options(schema: ValidatorSchema, options: ValidatorOptions) -> Validator {
        Self { schema, options }
    }

    /// Build the schema from JSON and construct a Validator over it
    pub fn from_json_value(json: serde_json::Value, options: ValidatorOptions) -> Result<Self> {
        let schema = ValidatorSchema::builder()
            .add_fragment(json_schema::Fragment::from_json_value(json)?)
            .allow_unknown_entity_types(options.allow_unknown_entity_types)
            .build()?;
        Ok(Self::with_options(schema, options))
    }

    /// Build the schema from a JSON string and construct a Validator over it
    pub fn from_json_str(json: &str, options: ValidatorOptions) -> Result<Self> {
        let schema = ValidatorSchema::builder()
            .add_fragment(json_schema::Fragment::from_json_str(json)?)
            .allow_unknown_entity_types(options.allow_unknown_entity_types)
            .build()?;
        Ok(Self::with_options(schema, options))
    }

    /// The schema this validator checks against
    pub fn schema(&self) -> &ValidatorSchema {
        &self.schema
    }

    /// The options this validator was constructed with
    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validate every policy, collecting all errors found in any of them.
    pub fn validate_policies<'a>(
        &self,
        policies: impl IntoIterator<Item = &'a Policy>,
    ) -> ValidationResult {
        ValidationResult::new(
            policies
                .into_iter()
                .flat_map(|policy| self.validate_policy(policy)),
        )
    }

    /// Run all validations against a single policy: scope checks, constant
    /// conditions and typechecking of each condition.
    fn validate_policy(&self, p: &Policy) -> Vec<ValidationError> {
        // with no usable action in the schema every policy is impossible,
        // and nothing else is worth reporting
        let errors = if self.schema.has_applicable_action() {
            let mut errors = self.validate_scope(p);
            errors.extend(constant_fold::impossible_conditions(p).map(|reason| {
                ValidationError::from(ImpossiblePolicy {
                    policy_id: p.id().clone(),
                    reason,
                })
            }));
            let env = RequestEnv::for_policy(&self.schema, p);
            Typechecker::new(
                &self.schema,
                p.id(),
                &env,
                self.options.max_attribute_level,
            )
            .typecheck_policy(p, &mut errors);
            errors
        } else {
            vec![ImpossiblePolicy {
                policy_id: p.id().clone(),
                reason: ImpossiblePolicyReason::NoApplicableActions,
            }
            .into()]
        };
        for err in &errors {
            trace!(policy_id = %p.id(), %err, "validation error");
        }
        debug!(policy_id = %p.id(), errors = errors.len(), "validated policy");
        errors
    }

    /// Check every entity against its declaration in the schema, collecting
    /// every problem with every entity.
    pub fn validate_entities<'a>(
        &self,
        entities: impl IntoIterator<Item = &'a Entity>,
    ) -> EntityValidationResult {
        let checker = EntitySchemaConformanceChecker::new(&self.schema, self.options.mode);
        let mut count = 0_usize;
        let errors: Vec<_> = entities
            .into_iter()
            .inspect(|_| count += 1)
            .flat_map(|entity| checker.validate_entity(entity))
            .collect();
        debug!(entities = count, errors = errors.len(), "validated entities");
        EntityValidationResult::new(errors)
    }
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{
        ActionConstraint, Clause, Effect, EntityUID, Expr, PolicyID, PrincipalOrResourceConstraint,
        Var,
    };
    use cool_asserts::assert_matches;
    use serde_json::json;
    use tracing_test::traced_test;

    fn validator(schema: serde_json::Value) -> Validator {
        Validator::from_json_value(schema, ValidatorOptions::default())
            .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn options_from_json() {
        let options = ValidatorOptions::from_json_value(json!({
            "maxAttributeLevel": 3,
            "mode": "strict",
        }))
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(options.max_attribute_level(), 3);
        assert!(options.mode().is_strict());
        assert!(!options.allow_unknown_entity_types());
        assert_eq!(
            ValidatorOptions::from_json_value(json!({})).ok(),
            Some(ValidatorOptions::default())
        );
        assert_matches!(
            ValidatorOptions::from_json_value(json!({"maxLevel": 1})),
            Err(_)
        );
    }

    #[test]
    fn options_compose_in_order() {
        let options = ValidatorOptions::default()
            .with_strict_entity_validation(true)
            .with_mode(ValidationMode::Permissive)
            .with_max_attribute_level(1)
            .with_allow_unknown_entity_types(true);
        assert_eq!(options.mode(), ValidationMode::Permissive);
        assert_eq!(options.max_attribute_level(), 1);
        assert!(options.allow_unknown_entity_types());
    }

    #[test]
    fn unknown_entity_types_option_reaches_schema() {
        let schema = json!({
            "entityTypes": { "User": { "memberOfTypes": ["Group"] } },
            "actions": {}
        });
        assert_matches!(
            Validator::from_json_value(schema.clone(), ValidatorOptions::default()),
            Err(SchemaError::UndeclaredEntityTypes(_))
        );
        assert_matches!(
            Validator::from_json_value(
                schema,
                ValidatorOptions::default().with_allow_unknown_entity_types(true)
            ),
            Ok(_)
        );
    }

    #[test]
    fn missing_schema() {
        assert_matches!(
            Validator::from_json_value(serde_json::Value::Null, ValidatorOptions::default()),
            Err(SchemaError::MissingSchema(_))
        );
    }

    #[test]
    #[traced_test]
    fn no_applicable_action_short_circuits() {
        let v = validator(json!({
            "entityTypes": { "User": {} },
            "actions": { "view": { "appliesTo": { "principalTypes": ["User"] } } }
        }));
        let policy = Policy::new(PolicyID::from_string("p0"), Effect::Permit)
            .with_condition(Clause::when(Expr::val(1)));
        let result = v.validate_policies([&policy]);
        let errors = result.validation_errors().collect::<Vec<_>>();
        assert_matches!(
            errors.as_slice(),
            [ValidationError::ImpossiblePolicy(ImpossiblePolicy {
                reason: ImpossiblePolicyReason::NoApplicableActions,
                ..
            })]
        );
        assert!(logs_contain("validated policy"));
    }

    #[test]
    fn every_policy_is_checked() {
        let v = validator(json!({
            "entityTypes": { "User": {}, "Document": {} },
            "actions": {
                "view": { "appliesTo": { "principalTypes": ["User"], "resourceTypes": ["Document"] } }
            }
        }));
        let bad = |id: &str| {
            Policy::new(PolicyID::from_string(id), Effect::Forbid)
                .with_principal(PrincipalOrResourceConstraint::Is("Usr".into()))
                .with_action(ActionConstraint::Eq(EntityUID::action("view")))
                .with_condition(Clause::when(Expr::get_attr(Expr::var(Var::Context), "x")))
        };
        let good = Policy::new(PolicyID::from_string("ok"), Effect::Permit);
        let policies = [bad("a"), good, bad("b")];
        let result = v.validate_policies(&policies);
        assert!(!result.validation_passed());
        assert!(result.errors_for_policy(&PolicyID::from_string("a")).count() >= 1);
        assert!(result.errors_for_policy(&PolicyID::from_string("b")).count() >= 1);
        assert_eq!(result.errors_for_policy(&PolicyID::from_string("ok")).count(), 0);
    }
}
