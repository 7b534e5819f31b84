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

//! Contains the validation logic for policy scopes: the entity types and
//! actions they name, and whether any action in the schema applies to the
//! principal and resource the scope allows.

use itertools::Itertools;

use crate::ast::{
    ActionConstraint, EntityType, EntityUID, ExprKind, Literal, Policy, PolicyID,
    PrincipalOrResourceConstraint,
};

use super::{
    validation_errors::{
        ImpossiblePolicy, ImpossiblePolicyReason, ScopeSide, UnrecognizedActionId,
        UnrecognizedEntityType,
    },
    ActionTypeInfo, ValidationError, Validator, ValidatorSchema,
};

impl ValidatorSchema {
    /// Declared actions that may be the request action of a policy with this
    /// action scope. `action in A` includes every transitive member of `A`.
    pub(crate) fn actions_satisfying_constraint<'a>(
        &'a self,
        action_constraint: &'a ActionConstraint,
    ) -> Vec<&'a ActionTypeInfo> {
        match action_constraint {
            ActionConstraint::Any => self.action_ids().collect(),
            ActionConstraint::Eq(euid) => self.get_action_id(euid).into_iter().collect(),
            ActionConstraint::In(_) | ActionConstraint::InSet(_) => action_constraint
                .iter_euids()
                .flat_map(|euid| self.actions_in(euid))
                .unique_by(|action| action.name().clone())
                .collect(),
        }
    }

    /// Would the scope constraint accept some entity of one of `allowed`?
    fn scope_allows(
        &self,
        constraint: &PrincipalOrResourceConstraint,
        allowed: &[EntityType],
    ) -> bool {
        match constraint {
            PrincipalOrResourceConstraint::Any => true,
            PrincipalOrResourceConstraint::Eq(euid) => {
                euid.entity_type().is_action() || allowed.contains(euid.entity_type())
            }
            PrincipalOrResourceConstraint::Is(ety) | PrincipalOrResourceConstraint::IsIn(ety, _) => {
                allowed.contains(ety)
            }
            PrincipalOrResourceConstraint::In(euid) => {
                let target = euid.entity_type();
                allowed.contains(target)
                    || allowed
                        .iter()
                        .any(|ty| self.can_be_descendant_of(ty, target))
            }
        }
    }
}

impl Validator {
    /// Check the three scope constraints of a policy and whether any action
    /// in its action scope can apply to the principals and resources it
    /// allows.
    pub(crate) fn validate_scope(&self, p: &Policy) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.validate_entity_types(p, &mut errors);
        self.validate_action_ids(p, &mut errors);
        errors.extend(self.validate_action_application(p));
        errors
    }

    /// Generate `UnrecognizedEntityType` for every entity type in the
    /// principal and resource scopes that is not in the schema. `==` and `in`
    /// scopes also accept action entity types; `is` scopes do not.
    ///
    /// Entity literals and `is` tests in the conditions are checked too, each
    /// distinct unknown type reported once. There both forms accept action
    /// entity types.
    fn validate_entity_types(&self, p: &Policy, errors: &mut Vec<ValidationError>) {
        for constraint in [p.principal_constraint(), p.resource_constraint()] {
            let (strict, lenient) = match constraint {
                PrincipalOrResourceConstraint::Any => (None, None),
                PrincipalOrResourceConstraint::Eq(euid) | PrincipalOrResourceConstraint::In(euid) => {
                    (None, Some(euid.entity_type()))
                }
                PrincipalOrResourceConstraint::Is(ety) => (Some(ety), None),
                PrincipalOrResourceConstraint::IsIn(ety, euid) => {
                    (Some(ety), Some(euid.entity_type()))
                }
            };
            let unknown_strict = strict.filter(|ety| !self.schema.is_known_entity_type(ety));
            let unknown_lenient = lenient
                .filter(|ety| !ety.is_action() && !self.schema.is_known_entity_type(ety));
            for ety in unknown_strict.into_iter().chain(unknown_lenient) {
                errors.push(self.unrecognized_entity_type(p.id(), ety));
            }
        }
        let condition_types = p
            .conditions()
            .flat_map(|c| c.body().subexpressions())
            .filter_map(|e| match e.expr_kind() {
                ExprKind::Lit(Literal::EntityUID(euid)) => Some(euid.entity_type()),
                ExprKind::Is { entity_type, .. } | ExprKind::IsIn { entity_type, .. } => {
                    Some(entity_type)
                }
                _ => None,
            })
            .filter(|ety| !ety.is_action() && !self.schema.is_known_entity_type(ety))
            .unique();
        for ety in condition_types {
            errors.push(self.unrecognized_entity_type(p.id(), ety));
        }
    }

    fn unrecognized_entity_type(&self, policy_id: &PolicyID, ety: &EntityType) -> ValidationError {
        UnrecognizedEntityType::new(policy_id.clone(), ety.clone(), &self.schema).into()
    }

    /// Generate `UnrecognizedActionId` for every action in the action scope
    /// that is not in the schema, and an impossible-policy error when none of
    /// the named actions applies to any principal and resource.
    fn validate_action_ids(&self, p: &Policy, errors: &mut Vec<ValidationError>) {
        let unknown_action = |euid: &EntityUID| -> ValidationError {
            UnrecognizedActionId::new(p.id().clone(), euid.clone(), &self.schema).into()
        };
        let impossible = |reason| -> ValidationError {
            ImpossiblePolicy {
                policy_id: p.id().clone(),
                reason,
            }
            .into()
        };
        match p.action_constraint() {
            ActionConstraint::Any => (),
            ActionConstraint::Eq(euid) => match self.schema.get_action_id(euid) {
                None => errors.push(unknown_action(euid)),
                Some(action) if !self.schema.has_valid_applies_to(action) => errors.push(
                    impossible(ImpossiblePolicyReason::ActionWithoutAppliesTo(euid.clone())),
                ),
                Some(_) => (),
            },
            constraint @ (ActionConstraint::In(_) | ActionConstraint::InSet(_)) => {
                let listed = constraint.iter_euids().collect_vec();
                if listed.is_empty() {
                    errors.push(impossible(ImpossiblePolicyReason::EmptyActionSet));
                    return;
                }
                errors.extend(
                    listed
                        .iter()
                        .filter(|euid| !self.schema.is_known_action_id(euid))
                        .map(|euid| unknown_action(*euid)),
                );
                let any_applies = self
                    .schema
                    .actions_satisfying_constraint(constraint)
                    .into_iter()
                    .any(|action| self.schema.has_valid_applies_to(action));
                if !any_applies {
                    errors.push(impossible(ImpossiblePolicyReason::NoListedActionApplies));
                }
            }
        }
    }

    /// Check that some (action, principal type, resource type) triple allowed
    /// by the schema satisfies all three scope constraints at once. Only runs
    /// when some candidate action has a valid `appliesTo`; otherwise
    /// `validate_action_ids` has already reported the policy.
    fn validate_action_application(&self, p: &Policy) -> Option<ValidationError> {
        let candidates = self
            .schema
            .actions_satisfying_constraint(p.action_constraint())
            .into_iter()
            .filter(|action| self.schema.has_valid_applies_to(action))
            .collect_vec();
        if candidates.is_empty() {
            return None;
        }
        let principal = p.principal_constraint();
        let resource = p.resource_constraint();
        let principal_ok =
            |action: &ActionTypeInfo| self.schema.scope_allows(principal, action.principal_types());
        let resource_ok =
            |action: &ActionTypeInfo| self.schema.scope_allows(resource, action.resource_types());
        if candidates
            .iter()
            .any(|action| principal_ok(action) && resource_ok(action))
        {
            return None;
        }

        let principal_somewhere = candidates.iter().any(|action| principal_ok(action));
        let resource_somewhere = candidates.iter().any(|action| resource_ok(action));
        let reason = match (principal_somewhere, resource_somewhere) {
            (true, true) => ImpossiblePolicyReason::UnsupportedCombination,
            (false, true) => side_failure(ScopeSide::Principal, principal),
            (true, false) => side_failure(ScopeSide::Resource, resource),
            (false, false) => match (principal, resource) {
                (PrincipalOrResourceConstraint::In(_), _) => {
                    side_failure(ScopeSide::Principal, principal)
                }
                (_, PrincipalOrResourceConstraint::In(_)) => {
                    side_failure(ScopeSide::Resource, resource)
                }
                _ => ImpossiblePolicyReason::ScopeTypeNotAllowed(ScopeSide::Both),
            },
        };
        Some(
            ImpossiblePolicy {
                policy_id: p.id().clone(),
                reason,
            }
            .into(),
        )
    }
}

/// Why one side of the scope could not be satisfied by any candidate action
fn side_failure(side: ScopeSide, constraint: &PrincipalOrResourceConstraint) -> ImpossiblePolicyReason {
    match constraint {
        PrincipalOrResourceConstraint::In(euid) => ImpossiblePolicyReason::InTargetUnreachable {
            side,
            target: euid.entity_type().clone(),
        },
        _ => ImpossiblePolicyReason::ScopeTypeNotAllowed(side),
    }
}
