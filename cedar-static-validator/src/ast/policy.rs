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

use super::{EntityType, EntityUID, Expr, PolicyID};
use serde::{Deserialize, Serialize};

/// The effect of a policy when it is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    /// this is a Permit policy
    Permit,
    /// this is a Forbid policy
    Forbid,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permit => write!(f, "permit"),
            Self::Forbid => write!(f, "forbid"),
        }
    }
}

/// Constraint on the principal or the resource in a policy scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalOrResourceConstraint {
    /// Unconstrained
    Any,
    /// `== uid`
    Eq(EntityUID),
    /// `in uid`
    In(EntityUID),
    /// `is T`
    Is(EntityType),
    /// `is T in uid`
    IsIn(EntityType, EntityUID),
}

impl PrincipalOrResourceConstraint {
    /// Entity type named directly by the constraint, if any. For `in` this is
    /// the type of the `in` target.
    pub fn entity_type(&self) -> Option<&EntityType> {
        match self {
            Self::Any => None,
            Self::Eq(euid) | Self::In(euid) => Some(euid.entity_type()),
            Self::Is(ety) | Self::IsIn(ety, _) => Some(ety),
        }
    }
}

/// Constraint on the action in a policy scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionConstraint {
    /// Unconstrained
    Any,
    /// `== uid`
    Eq(EntityUID),
    /// `in uid`
    In(EntityUID),
    /// `in [uid, ...]`
    InSet(Vec<EntityUID>),
}

impl ActionConstraint {
    /// Action ids named in the constraint
    pub fn iter_euids(&self) -> impl Iterator<Item = &EntityUID> {
        let euids: &[EntityUID] = match self {
            Self::Any => &[],
            Self::Eq(euid) | Self::In(euid) => std::slice::from_ref(euid),
            Self::InSet(euids) => euids,
        };
        euids.iter()
    }
}

/// Whether a condition must hold (`when`) or must not hold (`unless`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClauseKind {
    /// `when { ... }`
    When,
    /// `unless { ... }`
    Unless,
}

impl std::fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::When => write!(f, "when"),
            Self::Unless => write!(f, "unless"),
        }
    }
}

/// One `when` or `unless` condition of a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    kind: ClauseKind,
    body: Expr,
}

impl Clause {
    /// A `when` clause
    pub fn when(body: Expr) -> Self {
        Self {
            kind: ClauseKind::When,
            body,
        }
    }

    /// An `unless` clause
    pub fn unless(body: Expr) -> Self {
        Self {
            kind: ClauseKind::Unless,
            body,
        }
    }

    /// `when` or `unless`
    pub fn kind(&self) -> ClauseKind {
        self.kind
    }

    /// The condition expression
    pub fn body(&self) -> &Expr {
        &self.body
    }
}

/// A static policy as handed over by the policy parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    id: PolicyID,
    effect: Effect,
    principal: PrincipalOrResourceConstraint,
    action: ActionConstraint,
    resource: PrincipalOrResourceConstraint,
    conditions: Vec<Clause>,
}

impl Policy {
    /// Construct a policy with an unconstrained scope and no conditions.
    /// Use the `with_*` methods to fill it in.
    pub fn new(id: PolicyID, effect: Effect) -> Self {
        Self {
            id,
            effect,
            principal: PrincipalOrResourceConstraint::Any,
            action: ActionConstraint::Any,
            resource: PrincipalOrResourceConstraint::Any,
            conditions: Vec::new(),
        }
    }

    /// Set the principal constraint
    pub fn with_principal(mut self, principal: PrincipalOrResourceConstraint) -> Self {
        self.principal = principal;
        self
    }

    /// Set the action constraint
    pub fn with_action(mut self, action: ActionConstraint) -> Self {
        self.action = action;
        self
    }

    /// Set the resource constraint
    pub fn with_resource(mut self, resource: PrincipalOrResourceConstraint) -> Self {
        self.resource = resource;
        self
    }

    /// Append a `when` or `unless` clause
    pub fn with_condition(mut self, clause: Clause) -> Self {
        self.conditions.push(clause);
        self
    }

    /// Get the policy id
    pub fn id(&self) -> &PolicyID {
        &self.id
    }

    /// Get the effect
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Get the principal constraint
    pub fn principal_constraint(&self) -> &PrincipalOrResourceConstraint {
        &self.principal
    }

    /// Get the action constraint
    pub fn action_constraint(&self) -> &ActionConstraint {
        &self.action
    }

    /// Get the resource constraint
    pub fn resource_constraint(&self) -> &PrincipalOrResourceConstraint {
        &self.resource
    }

    /// The `when` and `unless` clauses in source order
    pub fn conditions(&self) -> impl Iterator<Item = &Clause> {
        self.conditions.iter()
    }
}
