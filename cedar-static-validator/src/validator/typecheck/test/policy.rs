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

//! Contains tests for typechecking whole policies, including the request
//! environment their scope produces.

use cool_asserts::assert_matches;
use similar_asserts::assert_eq;

use crate::ast::{
    ActionConstraint, Clause, Effect, EntityType, EntityUID, Expr, Policy,
    PrincipalOrResourceConstraint, Var,
};
use crate::validator::typecheck::{RequestEnv, Typechecker};
use crate::validator::types::Type;
use crate::validator::validation_errors::{
    AttributeAccess, UnexpectedType, UnexpectedTypeHelp, UnsafeAttributeAccess,
};
use crate::validator::ValidationError;

use super::test_utils::{expr_id_placeholder, photo_schema, typecheck_in_scope, view_policy};

fn typecheck_policy(p: &Policy) -> Vec<ValidationError> {
    let schema = photo_schema();
    let env = RequestEnv::for_policy(&schema, p);
    let mut errors = Vec::new();
    Typechecker::new(&schema, p.id(), &env, 0).typecheck_policy(p, &mut errors);
    errors
}

fn view_or_edit() -> ActionConstraint {
    ActionConstraint::InSet(vec![EntityUID::action("view"), EntityUID::action("edit")])
}

#[test]
fn conditions_must_be_boolean() {
    let p = view_policy()
        .with_condition(Clause::when(Expr::val(1)))
        .with_condition(Clause::unless(Expr::val(false)));
    assert_matches!(
        typecheck_policy(&p).as_slice(),
        [ValidationError::UnexpectedType(UnexpectedType {
            actual: Type::Long,
            help: Some(UnexpectedTypeHelp::ConditionNotBool),
            ..
        })]
    );
}

#[test]
fn unspecified_condition() {
    let p = view_policy().with_condition(Clause::when(Expr::get_attr(
        Expr::var(Var::Principal),
        "flag",
    )));
    assert_matches!(
        typecheck_policy(&p).as_slice(),
        [ValidationError::UnexpectedType(UnexpectedType {
            actual: Type::Unspecified,
            help: Some(UnexpectedTypeHelp::UnspecifiedNotBool),
            ..
        })]
    );
}

#[test]
fn unknown_condition_is_accepted() {
    let p = view_policy().with_condition(Clause::when(Expr::call_extension_fn(
        "frobnicate",
        vec![],
    )));
    assert_eq!(typecheck_policy(&p), vec![]);
}

#[test]
fn shared_context_attribute() {
    let p = Policy::new(expr_id_placeholder(), Effect::Permit)
        .with_action(view_or_edit())
        .with_condition(Clause::when(Expr::is_eq(
            Expr::get_attr(Expr::var(Var::Context), "reason"),
            Expr::val("audit"),
        )));
    assert_eq!(typecheck_policy(&p), vec![]);
}

#[test]
fn context_attribute_of_one_action() {
    let p = Policy::new(expr_id_placeholder(), Effect::Permit).with_action(view_or_edit());
    let (_, errs) = typecheck_in_scope(&p, &Expr::get_attr(Expr::var(Var::Context), "ip"), 0);
    // several actions, so the message cannot name one of them
    assert_matches!(
        errs.as_slice(),
        [ValidationError::UnsafeAttributeAccess(UnsafeAttributeAccess {
            attribute_access: AttributeAccess::Record(_),
            ..
        })]
    );
}

#[test]
fn env_of_pinned_scope() {
    let env = RequestEnv::for_policy(&photo_schema(), &view_policy());
    assert_eq!(env.principal, Type::named_entity("User"));
    assert_eq!(env.resource, Type::named_entity("Photo"));
    assert_eq!(env.action, Type::Entity(EntityType::action()));
    assert_eq!(env.action_uid, Some(EntityUID::action("view")));
    assert_eq!(env.context.attrs.len(), 3);
}

#[test]
fn env_of_unconstrained_scope() {
    let p = Policy::new(expr_id_placeholder(), Effect::Forbid);
    let env = RequestEnv::for_policy(&photo_schema(), &p);
    // `list` also accepts groups
    assert_eq!(env.principal, Type::AnyEntity);
    assert_eq!(env.resource, Type::named_entity("Photo"));
    assert_eq!(env.action_uid, None);
    // `list` declares no context
    assert!(env.context.is_open());
    assert!(env.context.attrs.is_empty());
}

#[test]
fn env_of_action_set() {
    let p = Policy::new(expr_id_placeholder(), Effect::Permit)
        .with_principal(PrincipalOrResourceConstraint::In(EntityUID::new("Group", "g")))
        .with_action(view_or_edit());
    let env = RequestEnv::for_policy(&photo_schema(), &p);
    assert_eq!(env.principal, Type::named_entity("User"));
    assert!(!env.context.is_open());
    assert_matches!(env.context.attrs.get_attr("reason"), Some(a) => assert!(a.is_required()));
    // optional for `view`, required for `edit`
    assert_matches!(env.context.attrs.get_attr("urgent"), Some(a) => assert!(!a.is_required()));
    assert_matches!(env.context.attrs.get_attr("ip"), None);
}

#[test]
fn env_of_principal_eq() {
    let p = Policy::new(expr_id_placeholder(), Effect::Permit)
        .with_principal(PrincipalOrResourceConstraint::Eq(EntityUID::new("Group", "g")))
        .with_action(ActionConstraint::Eq(EntityUID::action("list")));
    let env = RequestEnv::for_policy(&photo_schema(), &p);
    assert_eq!(env.principal, Type::named_entity("Group"));
    assert_eq!(env.context, crate::validator::types::RecordType::open());
}
