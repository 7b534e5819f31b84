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

//! Implements typechecking for Cedar policies. Typechecking is done using
//! the `Typechecker` struct by calling the `typecheck_policy` method given a
//! policy and the request environment derived from its scope.


use std::collections::BTreeSet;

use itertools::Itertools;
use smol_str::SmolStr;

use crate::ast::{
    ActionConstraint, BinaryOp, EntityType, EntityUID, Expr, ExprKind, Literal, Policy, PolicyID,
    PrincipalOrResourceConstraint, UnaryOp, Var,
};
use crate::fuzzy_match::fuzzy_search;

use super::extensions;
use super::types::{
    record_types_have_lub, type_category, types_match, unify_types, AttributeType, Attributes,
    ExtensionName, OpenTag, RecordType, Type,
};
use super::validation_errors::{
    AttributeAccess, AttributeAccessOnNonRecord, EntityDerefLevelViolation, IncompatibleTypes,
    InvalidExtensionLiteral, InvalidOperand, LubContext, LubHelp, OperandRequirement,
    RecursionLimit, UndeclaredEntityTypeAccess, UnexpectedType, UnexpectedTypeHelp,
    UnrecognizedActionId, UnsafeAttributeAccess, WrongNumberArguments,
};
use super::{ValidationError, ValidatorSchema};

const REQUIRED_STACK_SPACE: usize = 1024 * 100;

/// Types of the request variables seen by the conditions of one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestEnv {
    principal: Type,
    action: Type,
    /// Set when the scope pins a single action
    action_uid: Option<EntityUID>,
    resource: Type,
    context: RecordType,
}

impl RequestEnv {
    /// Derive the request environment from the scope of `p`.
    ///
    /// A scope that pins the principal or resource type (`==`, `is`, `is in`)
    /// decides its type directly. Otherwise the type is the single type
    /// allowed by every candidate action, or any entity when the candidates
    /// disagree. The context is the part of the candidates' contexts that
    /// they all agree on.
    pub(crate) fn for_policy(schema: &ValidatorSchema, p: &Policy) -> Self {
        let candidates = schema.actions_satisfying_constraint(p.action_constraint());
        let applicable = candidates
            .iter()
            .filter(|action| schema.has_valid_applies_to(action))
            .collect_vec();
        let principal = scope_var_type(
            p.principal_constraint(),
            applicable
                .iter()
                .flat_map(|action| action.principal_types()),
        );
        let resource = scope_var_type(
            p.resource_constraint(),
            applicable.iter().flat_map(|action| action.resource_types()),
        );
        let (action, action_uid) = match p.action_constraint() {
            ActionConstraint::Eq(euid) => {
                (Type::Entity(euid.entity_type().clone()), Some(euid.clone()))
            }
            _ => (Type::Entity(EntityType::action()), None),
        };
        let context = candidates
            .iter()
            .map(|action| action.context().clone())
            .reduce(|r1, r2| intersect_records(&r1, &r2))
            .unwrap_or_else(RecordType::open);
        Self {
            principal,
            action,
            action_uid,
            resource,
            context,
        }
    }
}

fn scope_var_type<'a>(
    constraint: &PrincipalOrResourceConstraint,
    allowed: impl Iterator<Item = &'a EntityType>,
) -> Type {
    match constraint {
        PrincipalOrResourceConstraint::Eq(euid) => Type::Entity(euid.entity_type().clone()),
        PrincipalOrResourceConstraint::Is(ety) | PrincipalOrResourceConstraint::IsIn(ety, _) => {
            Type::Entity(ety.clone())
        }
        PrincipalOrResourceConstraint::Any | PrincipalOrResourceConstraint::In(_) => {
            match allowed.unique().exactly_one() {
                Ok(ety) => Type::Entity(ety.clone()),
                Err(_) => Type::AnyEntity,
            }
        }
    }
}

/// Attributes present in both records with types that match both ways.
/// Such an attribute stays required only when both records require it.
fn intersect_records(r1: &RecordType, r2: &RecordType) -> RecordType {
    let attrs: Attributes = r1
        .attrs
        .iter()
        .filter_map(|(name, a1)| {
            let a2 = r2.attrs.get_attr(name)?;
            (types_match(&a1.attr_type, &a2.attr_type) && types_match(&a2.attr_type, &a1.attr_type))
                .then(|| {
                    (
                        name.clone(),
                        AttributeType::new(
                            a1.attr_type.clone(),
                            a1.is_required() && a2.is_required(),
                        ),
                    )
                })
        })
        .collect();
    RecordType::new(attrs, OpenTag::from(r1.is_open() || r2.is_open()))
}

/// This structure implements typechecking for the conditions of a single
/// policy through the entry point `typecheck_policy`.
#[derive(Debug)]
pub(crate) struct Typechecker<'a> {
    schema: &'a ValidatorSchema,
    policy_id: &'a PolicyID,
    env: &'a RequestEnv,
    /// `0` means attribute access chains are not limited
    max_attribute_level: u32,
}

impl<'a> Typechecker<'a> {
    pub(crate) fn new(
        schema: &'a ValidatorSchema,
        policy_id: &'a PolicyID,
        env: &'a RequestEnv,
        max_attribute_level: u32,
    ) -> Self {
        Self {
            schema,
            policy_id,
            env,
            max_attribute_level,
        }
    }

    /// Typecheck every condition of `p`, adding the errors found to
    /// `type_errors`. Each condition must have boolean type.
    pub(crate) fn typecheck_policy(&self, p: &Policy, type_errors: &mut Vec<ValidationError>) {
        for clause in p.conditions() {
            let ty = self.typecheck(clause.body(), 0, type_errors);
            let help = match ty {
                Type::Bool | Type::Unknown => continue,
                Type::Unspecified => UnexpectedTypeHelp::UnspecifiedNotBool,
                _ => UnexpectedTypeHelp::ConditionNotBool,
            };
            type_errors.push(self.unexpected_type(Type::Bool, ty, Some(help)));
        }
    }

    /// Compute the type of `e`, pushing every error found in it. `level` is
    /// the number of attribute accesses enclosing `e`.
    fn typecheck(&self, e: &Expr, level: u32, type_errors: &mut Vec<ValidationError>) -> Type {
        if stacker::remaining_stack().unwrap_or(REQUIRED_STACK_SPACE) < REQUIRED_STACK_SPACE {
            let err = ValidationError::from(RecursionLimit {
                policy_id: self.policy_id.clone(),
            });
            if !type_errors.contains(&err) {
                type_errors.push(err);
            }
            return Type::Unknown;
        }

        match e.expr_kind() {
            ExprKind::Lit(lit) => self.typecheck_literal(lit, type_errors),

            ExprKind::Var(Var::Principal) => self.env.principal.clone(),
            ExprKind::Var(Var::Action) => self.env.action.clone(),
            ExprKind::Var(Var::Resource) => self.env.resource.clone(),
            ExprKind::Var(Var::Context) => Type::Record(self.env.context.clone()),

            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => {
                let test_ty = self.typecheck(test_expr, level, type_errors);
                if !test_ty.may_be(&Type::Bool) {
                    type_errors.push(self.unexpected_type(Type::Bool, test_ty, None));
                }
                let then_ty = self.typecheck(then_expr, level, type_errors);
                let else_ty = self.typecheck(else_expr, level, type_errors);
                unify_types(&then_ty, &else_ty)
            }

            ExprKind::And { left, right } | ExprKind::Or { left, right } => {
                for operand in [left, right] {
                    let ty = self.typecheck(operand, level, type_errors);
                    self.require(
                        OperandRequirement::Boolean,
                        ty.may_be(&Type::Bool),
                        &ty,
                        type_errors,
                    );
                }
                Type::Bool
            }

            ExprKind::UnaryApp { op, arg } => {
                let ty = self.typecheck(arg, level, type_errors);
                match op {
                    UnaryOp::Not => {
                        self.require(
                            OperandRequirement::Boolean,
                            ty.may_be(&Type::Bool),
                            &ty,
                            type_errors,
                        );
                        Type::Bool
                    }
                    UnaryOp::Neg => {
                        self.require(
                            OperandRequirement::Arithmetic,
                            ty.may_be(&Type::Long),
                            &ty,
                            type_errors,
                        );
                        Type::Long
                    }
                    UnaryOp::IsEmpty => {
                        self.require(
                            OperandRequirement::IsEmpty,
                            ty.may_be_set(),
                            &ty,
                            type_errors,
                        );
                        Type::Bool
                    }
                }
            }

            ExprKind::BinaryApp { op, arg1, arg2 } => {
                let ty1 = self.typecheck(arg1, level, type_errors);
                let ty2 = self.typecheck(arg2, level, type_errors);
                self.typecheck_binary(*op, &ty1, &ty2, type_errors)
            }

            ExprKind::ExtensionFunctionApp { fn_name, args } => {
                self.typecheck_extension_app(fn_name, args, level, type_errors)
            }

            ExprKind::GetAttr { expr, attr } => {
                self.typecheck_get_attr(expr, attr, level + 1, type_errors)
            }

            ExprKind::HasAttr { expr, .. } => {
                let ty = self.typecheck(expr, level, type_errors);
                self.require(
                    OperandRequirement::Has,
                    ty.may_be_entity() || matches!(ty, Type::Record(_)),
                    &ty,
                    type_errors,
                );
                Type::Bool
            }

            ExprKind::Like { expr, .. } => {
                let ty = self.typecheck(expr, level, type_errors);
                self.require(
                    OperandRequirement::Like,
                    ty.may_be(&Type::String),
                    &ty,
                    type_errors,
                );
                Type::Bool
            }

            ExprKind::Is { expr, .. } => {
                let ty = self.typecheck(expr, level, type_errors);
                self.require(OperandRequirement::Is, ty.may_be_entity(), &ty, type_errors);
                Type::Bool
            }

            ExprKind::IsIn { expr, in_expr, .. } => {
                let ty = self.typecheck(expr, level, type_errors);
                self.require(OperandRequirement::Is, ty.may_be_entity(), &ty, type_errors);
                let in_ty = self.typecheck(in_expr, level, type_errors);
                self.require_in_right(&in_ty, type_errors);
                Type::Bool
            }

            ExprKind::Set(elements) => {
                let element_types = elements
                    .iter()
                    .map(|elem| self.typecheck(elem, level, type_errors))
                    .collect_vec();
                let element_ty = element_types
                    .into_iter()
                    .reduce(|acc, ty| {
                        if !compatible(&acc, &ty) {
                            type_errors.push(self.incompatible_types(
                                &acc,
                                &ty,
                                LubHelp::None,
                                LubContext::Set,
                            ));
                        }
                        unify_types(&acc, &ty)
                    })
                    .unwrap_or(Type::Unknown);
                Type::set(element_ty)
            }

            ExprKind::Record(fields) => Type::closed_record_with_required_attributes(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.typecheck(value, level, type_errors)))
                    .collect_vec(),
            ),
        }
    }

    fn typecheck_literal(&self, lit: &Literal, type_errors: &mut Vec<ValidationError>) -> Type {
        match lit {
            Literal::Bool(_) => Type::Bool,
            Literal::Long(_) => Type::Long,
            Literal::String(_) => Type::String,
            Literal::EntityUID(euid) => {
                if euid.entity_type().is_action() && !self.schema.is_known_action_id(euid) {
                    type_errors.push(
                        UnrecognizedActionId::new(self.policy_id.clone(), euid.clone(), self.schema)
                            .into(),
                    );
                }
                Type::Entity(euid.entity_type().clone())
            }
        }
    }

    fn typecheck_binary(
        &self,
        op: BinaryOp,
        ty1: &Type,
        ty2: &Type,
        type_errors: &mut Vec<ValidationError>,
    ) -> Type {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                self.check_equality(ty1, ty2, type_errors);
                Type::Bool
            }

            BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
                let ok1 = orderable(ty1);
                let ok2 = orderable(ty2);
                self.require(OperandRequirement::Comparison, ok1, ty1, type_errors);
                self.require(OperandRequirement::Comparison, ok2, ty2, type_errors);
                // both operands must be of the same kind, e.g. `datetime < Long`
                // is never true
                if ok1 && ok2 && !ty1.is_unknown() && !ty2.is_unknown() && ty1 != ty2 {
                    self.require(OperandRequirement::Comparison, false, ty2, type_errors);
                }
                Type::Bool
            }

            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                for ty in [ty1, ty2] {
                    self.require(
                        OperandRequirement::Arithmetic,
                        ty.may_be(&Type::Long),
                        ty,
                        type_errors,
                    );
                }
                Type::Long
            }

            BinaryOp::In => {
                self.require(
                    OperandRequirement::InLeft,
                    ty1.may_be_entity(),
                    ty1,
                    type_errors,
                );
                self.require_in_right(ty2, type_errors);
                Type::Bool
            }

            BinaryOp::Contains => {
                self.require(OperandRequirement::Set, ty1.may_be_set(), ty1, type_errors);
                if let Type::Set(element_ty) = ty1 {
                    if !compatible(element_ty, ty2) {
                        type_errors.push(self.incompatible_types(
                            element_ty,
                            ty2,
                            LubHelp::None,
                            LubContext::Contains,
                        ));
                    }
                }
                Type::Bool
            }

            BinaryOp::ContainsAll | BinaryOp::ContainsAny => {
                self.require(OperandRequirement::Set, ty1.may_be_set(), ty1, type_errors);
                self.require(
                    OperandRequirement::SetArgument,
                    ty2.may_be_set(),
                    ty2,
                    type_errors,
                );
                if let (Type::Set(elem1), Type::Set(elem2)) = (ty1, ty2) {
                    if !compatible(elem1, elem2) {
                        type_errors.push(self.incompatible_types(
                            ty1,
                            ty2,
                            LubHelp::None,
                            LubContext::ContainsAnyAll,
                        ));
                    }
                }
                Type::Bool
            }

            BinaryOp::GetTag | BinaryOp::HasTag => {
                self.require(
                    OperandRequirement::TagTarget,
                    ty1.may_be_entity(),
                    ty1,
                    type_errors,
                );
                self.require(
                    OperandRequirement::TagName,
                    ty2.may_be(&Type::String),
                    ty2,
                    type_errors,
                );
                // tag types are not declared in the schema
                if op == BinaryOp::GetTag {
                    Type::Unknown
                } else {
                    Type::Bool
                }
            }
        }
    }

    /// `==` and `!=` are accepted between any two operands that could hold
    /// equal values.
    fn check_equality(&self, ty1: &Type, ty2: &Type, type_errors: &mut Vec<ValidationError>) {
        let cat1 = type_category(ty1, self.schema);
        let cat2 = type_category(ty2, self.schema);
        if !cat1.comparable_with(cat2) {
            type_errors.push(self.incompatible_types(
                ty1,
                ty2,
                LubHelp::Category,
                LubContext::Equality,
            ));
        } else if let (Type::Record(r1), Type::Record(r2)) = (ty1, ty2) {
            if let Err(hint) = record_types_have_lub(r1, r2) {
                type_errors.push(self.incompatible_types(ty1, ty2, hint, LubContext::Equality));
            }
        }
    }

    fn typecheck_extension_app(
        &self,
        fn_name: &SmolStr,
        args: &[Expr],
        level: u32,
        type_errors: &mut Vec<ValidationError>,
    ) -> Type {
        let arg_types = args
            .iter()
            .map(|arg| self.typecheck(arg, level, type_errors))
            .collect_vec();
        let Some(fn_type) = extensions::function_type(fn_name) else {
            return Type::Unknown;
        };
        if fn_type.arg_types().len() != args.len() {
            type_errors.push(
                WrongNumberArguments {
                    policy_id: self.policy_id.clone(),
                    name: fn_name.clone(),
                    expected: fn_type.arg_types().len(),
                    actual: args.len(),
                }
                .into(),
            );
            return fn_type.return_type().clone();
        }
        for (expected, actual) in fn_type.arg_types().iter().zip(arg_types) {
            if !types_match(expected, &actual) {
                type_errors.push(self.unexpected_type(expected.clone(), actual, None));
            }
        }
        // constructor arguments written as string literals are checked now
        if let (Some(kind), [arg]) = (fn_type.constructed_type(), args) {
            if let ExprKind::Lit(Literal::String(literal)) = arg.expr_kind() {
                if let Err(msg) = fn_type.check_literal(literal) {
                    type_errors.push(
                        InvalidExtensionLiteral {
                            policy_id: self.policy_id.clone(),
                            kind,
                            literal: literal.clone(),
                            msg,
                        }
                        .into(),
                    );
                }
            }
        }
        fn_type.return_type().clone()
    }

    fn typecheck_get_attr(
        &self,
        expr: &Expr,
        attr: &SmolStr,
        level: u32,
        type_errors: &mut Vec<ValidationError>,
    ) -> Type {
        // reported once, at the innermost access beyond the limit
        if self.max_attribute_level != 0 && level == self.max_attribute_level.saturating_add(1) {
            type_errors.push(
                EntityDerefLevelViolation {
                    policy_id: self.policy_id.clone(),
                    allowed_level: self.max_attribute_level,
                    actual_level: level,
                }
                .into(),
            );
        }

        let base_ty = self.typecheck(expr, level, type_errors);
        match &base_ty {
            Type::Unknown | Type::Unspecified | Type::AnyEntity => Type::Unknown,
            Type::Entity(ety) => match self.schema.get_entity_type(ety) {
                Some(info) => match info.attr(attr) {
                    Some(attr_ty) => attr_ty.attr_type.clone(),
                    None if info.open_attributes().is_open() => Type::Unknown,
                    None => {
                        type_errors.push(self.unsafe_attribute_access(
                            AttributeAccess::Entity(ety.clone(), attr.clone()),
                            info.attributes().keys(),
                        ));
                        Type::Unknown
                    }
                },
                // actions have no attributes
                None if ety.is_action() => {
                    type_errors.push(self.unsafe_attribute_access(
                        AttributeAccess::Entity(ety.clone(), attr.clone()),
                        std::iter::empty(),
                    ));
                    Type::Unknown
                }
                None => {
                    type_errors.push(
                        UndeclaredEntityTypeAccess {
                            policy_id: self.policy_id.clone(),
                            entity_type: ety.clone(),
                            attr: attr.clone(),
                        }
                        .into(),
                    );
                    Type::Unknown
                }
            },
            Type::Record(record) => match record.attrs.get_attr(attr) {
                Some(attr_ty) => attr_ty.attr_type.clone(),
                None if record.is_open() => Type::Unknown,
                None => {
                    let access = match (expr.expr_kind(), &self.env.action_uid) {
                        (ExprKind::Var(Var::Context), Some(action)) => {
                            AttributeAccess::Context(action.clone(), attr.clone())
                        }
                        _ => AttributeAccess::Record(attr.clone()),
                    };
                    type_errors.push(self.unsafe_attribute_access(access, record.attrs.keys()));
                    Type::Unknown
                }
            },
            _ => {
                type_errors.push(
                    AttributeAccessOnNonRecord {
                        policy_id: self.policy_id.clone(),
                        attr: attr.clone(),
                        actual: base_ty.clone(),
                    }
                    .into(),
                );
                Type::Unknown
            }
        }
    }

    /// The right operand of `in` must be an entity or a set of entities
    fn require_in_right(&self, ty: &Type, type_errors: &mut Vec<ValidationError>) {
        let ok = match ty {
            Type::Set(element_ty) => element_ty.may_be_entity(),
            _ => ty.may_be_entity(),
        };
        self.require(OperandRequirement::InRight, ok, ty, type_errors);
    }

    fn require(
        &self,
        requirement: OperandRequirement,
        satisfied: bool,
        actual: &Type,
        type_errors: &mut Vec<ValidationError>,
    ) {
        if !satisfied {
            type_errors.push(
                InvalidOperand {
                    policy_id: self.policy_id.clone(),
                    requirement,
                    actual: actual.clone(),
                }
                .into(),
            );
        }
    }

    fn unexpected_type(
        &self,
        expected: Type,
        actual: Type,
        help: Option<UnexpectedTypeHelp>,
    ) -> ValidationError {
        UnexpectedType {
            policy_id: self.policy_id.clone(),
            expected: vec![expected],
            actual,
            help,
        }
        .into()
    }

    fn incompatible_types(
        &self,
        ty1: &Type,
        ty2: &Type,
        hint: LubHelp,
        context: LubContext,
    ) -> ValidationError {
        IncompatibleTypes {
            policy_id: self.policy_id.clone(),
            types: BTreeSet::from([ty1.clone(), ty2.clone()]),
            hint,
            context,
        }
        .into()
    }

    fn unsafe_attribute_access<'b>(
        &self,
        access: AttributeAccess,
        known_attrs: impl Iterator<Item = &'b SmolStr>,
    ) -> ValidationError {
        let known_attrs = known_attrs.map(SmolStr::as_str).collect_vec();
        let suggestion = fuzzy_search(access.attr(), &known_attrs);
        UnsafeAttributeAccess {
            policy_id: self.policy_id.clone(),
            attribute_access: access,
            suggestion,
        }
        .into()
    }
}

/// Could values of the two types ever be equal?
fn compatible(ty1: &Type, ty2: &Type) -> bool {
    types_match(ty1, ty2) || types_match(ty2, ty1)
}

/// Operands of `<` and friends
fn orderable(ty: &Type) -> bool {
    ty.may_be(&Type::Long)
        || matches!(
            ty,
            Type::Extension(ExtensionName::Datetime | ExtensionName::Duration)
        )
}
