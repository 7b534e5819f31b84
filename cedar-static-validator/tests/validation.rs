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

//! End-to-end checks of the three validation operations through the public
//! API.

#![allow(clippy::panic)]

use cedar_static_validator::ast::{
    ActionConstraint, Clause, Effect, EntityUID, Expr, Policy, PolicyID, Request, Var,
};
use cedar_static_validator::entities::conformance::err::EntityValidationError;
use cedar_static_validator::entities::json::{context_from_json_value, entities_from_json_value};
use cedar_static_validator::validator::{
    ImpossiblePolicy, ImpossiblePolicyReason, InvalidExtensionLiteral, RequestValidationError,
    ValidationError, ValidationMode, Validator, ValidatorOptions,
};
use cool_asserts::assert_matches;
use serde_json::json;
use similar_asserts::assert_eq;

fn user_document_validator(resource_types: serde_json::Value) -> Validator {
    Validator::from_json_value(
        json!({
            "entityTypes": { "User": {}, "Document": {} },
            "actions": {
                "view": { "appliesTo": {
                    "principalTypes": ["User"],
                    "resourceTypes": resource_types
                } }
            }
        }),
        ValidatorOptions::default(),
    )
    .unwrap_or_else(|e| panic!("schema should build: {e}"))
}

fn view_policy(id: &str) -> Policy {
    Policy::new(PolicyID::from_string(id), Effect::Permit)
        .with_action(ActionConstraint::Eq(EntityUID::action("view")))
}

#[test]
fn undeclared_context_is_lenient() {
    let validator = user_document_validator(json!(["Document"]));
    let policy = view_policy("p0").with_condition(Clause::when(Expr::is_eq(
        Expr::get_attr(Expr::var(Var::Context), "reason"),
        Expr::val("audit"),
    )));
    let result = validator.validate_policies([&policy]);
    assert!(
        result.validation_passed(),
        "{:?}",
        result.validation_errors().collect::<Vec<_>>()
    );
}

#[test]
fn unknown_types_in_conditions() {
    let validator = user_document_validator(json!(["Document"]));
    let policy = view_policy("p0")
        .with_condition(Clause::when(Expr::is_eq(
            Expr::var(Var::Principal),
            Expr::val(EntityUID::new("Usr", "alice")),
        )))
        .with_condition(Clause::when(Expr::is_entity_type(
            Expr::var(Var::Resource),
            "Doc",
        )));
    let result = validator.validate_policies([&policy]);
    let messages = result
        .into_errors()
        .map(|err| match err {
            ValidationError::UnrecognizedEntityType(_) => err.to_string(),
            other => panic!("unexpected error {other}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        messages,
        vec![
            "for policy `p0`, unrecognized entity type `Usr`".to_string(),
            "for policy `p0`, unrecognized entity type `Doc`".to_string(),
        ]
    );
}

#[test]
fn action_without_resource_types_is_impossible() {
    let validator = user_document_validator(json!([]));
    let result = validator.validate_policies([&view_policy("p0")]);
    assert!(!result.validation_passed());
    assert!(result
        .validation_errors()
        .any(ValidationError::is_impossible_policy));
    let serialized = serde_json::to_value(&result).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(serialized.get("valid"), Some(&json!(false)));
}

#[test]
fn constant_unless_is_impossible() {
    let validator = user_document_validator(json!(["Document"]));
    let policy = view_policy("p0").with_condition(Clause::unless(Expr::or(
        Expr::val(true),
        Expr::val(false),
    )));
    let result = validator.validate_policies([&policy]);
    assert_matches!(
        result.validation_errors().collect::<Vec<_>>().as_slice(),
        [ValidationError::ImpossiblePolicy(ImpossiblePolicy {
            reason: ImpossiblePolicyReason::UnlessAlwaysTrue,
            ..
        })]
    );
}

#[test]
fn datetime_and_duration_literals() {
    let validator = user_document_validator(json!(["Document"]));
    let call = |f: &str, arg: &str| Expr::call_extension_fn(f, vec![Expr::val(arg)]);
    let good = view_policy("good")
        .with_condition(Clause::when(Expr::less(
            call("datetime", "2024-01-01T00:00:00Z"),
            call("datetime", "2024-06-01"),
        )))
        .with_condition(Clause::when(Expr::greater(
            call("duration", "1h"),
            call("duration", "30m"),
        )));
    let result = validator.validate_policies([&good]);
    assert!(
        result.validation_passed(),
        "{:?}",
        result.validation_errors().collect::<Vec<_>>()
    );

    let bad = view_policy("bad")
        .with_condition(Clause::when(Expr::is_eq(
            call("datetime", ""),
            call("datetime", "2024-01-01"),
        )))
        .with_condition(Clause::when(Expr::is_eq(
            call("duration", ""),
            call("duration", "1h"),
        )));
    let result = validator.validate_policies([&bad]);
    let kinds = result
        .validation_errors()
        .map(|err| match err {
            ValidationError::InvalidExtensionLiteral(InvalidExtensionLiteral { kind, .. }) => {
                kind.to_string()
            }
            other => panic!("unexpected error {other}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["datetime".to_string(), "duration".to_string()]);
}

#[test]
fn entities_from_json_are_validated() {
    let validator = Validator::from_json_value(
        json!({
            "entityTypes": {
                "User": {
                    "memberOfTypes": ["Group"],
                    "shape": { "type": "Record", "attributes": {
                        "name": { "type": "String" },
                        "age": { "type": "Long", "required": true }
                    } }
                },
                "Group": {}
            },
            "actions": {}
        }),
        ValidatorOptions::default(),
    )
    .unwrap_or_else(|e| panic!("{e}"));
    let entities = entities_from_json_value(json!([
        {
            "uid": { "type": "User", "id": "alice" },
            "attrs": { "name": "Alice" },
            "parents": [{ "type": "Group", "id": "admins" }]
        },
        { "uid": { "type": "Group", "id": "admins" } }
    ]))
    .unwrap_or_else(|e| panic!("{e}"));
    let result = validator.validate_entities(&entities);
    assert!(!result.validation_passed());
    assert_matches!(
        result.validation_errors().collect::<Vec<_>>().as_slice(),
        [EntityValidationError::MissingRequiredEntityAttr(e)] => assert_eq!(e.attr(), "age")
    );
    assert_eq!(
        serde_json::to_value(&result).unwrap_or_else(|e| panic!("{e}")),
        json!({
            "valid": false,
            "errors": [{
                "entityUid": { "type": "User", "id": "alice" },
                "message": "expected entity `User::\"alice\"` to have attribute `age`, but it does not"
            }]
        })
    );
}

#[test]
fn request_with_json_context() {
    let validator = Validator::from_json_value(
        json!({
            "entityTypes": { "User": {}, "Document": {} },
            "actions": {
                "view": { "appliesTo": {
                    "principalTypes": ["User"],
                    "resourceTypes": ["Document"],
                    "context": { "type": "Record", "attributes": {
                        "reason": { "type": "String" },
                        "source": { "type": "Extension", "name": "ipaddr" }
                    } }
                } }
            }
        }),
        ValidatorOptions::default().with_mode(ValidationMode::Strict),
    )
    .unwrap_or_else(|e| panic!("{e}"));
    let request = |context: serde_json::Value| {
        Request::new(
            EntityUID::new("User", "alice"),
            EntityUID::action("view"),
            EntityUID::new("Document", "d"),
            context_from_json_value(context).unwrap_or_else(|e| panic!("{e}")),
        )
    };
    assert_eq!(
        validator.validate_request(&request(json!({
            "reason": "audit",
            "source": { "__extn": { "fn": "ip", "arg": "192.168.0.1" } }
        }))),
        Ok(())
    );
    assert_matches!(
        validator.validate_request(&request(json!({ "reason": "audit", "source": "192.168.0.1" }))),
        Err(RequestValidationError::InvalidContext(_))
    );
}
