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

//! Detects policy conditions whose value does not depend on the request.

use crate::ast::{ClauseKind, Expr, ExprKind, Literal, Policy, UnaryOp};

use super::validation_errors::ImpossiblePolicyReason;

/// The boolean value `e` always has, if it can be found without knowing the
/// request. `false && x` and `true || x` are constant whatever `x` is.
pub(crate) fn constant_bool(e: &Expr) -> Option<bool> {
    match e.expr_kind() {
        ExprKind::Lit(Literal::Bool(b)) => Some(*b),
        ExprKind::UnaryApp {
            op: UnaryOp::Not,
            arg,
        } => constant_bool(arg).map(|b| !b),
        ExprKind::And { left, right } => match constant_bool(left)? {
            false => Some(false),
            true => constant_bool(right),
        },
        ExprKind::Or { left, right } => match constant_bool(left)? {
            true => Some(true),
            false => constant_bool(right),
        },
        ExprKind::If {
            test_expr,
            then_expr,
            else_expr,
        } => match constant_bool(test_expr) {
            Some(true) => constant_bool(then_expr),
            Some(false) => constant_bool(else_expr),
            None => match (constant_bool(then_expr)?, constant_bool(else_expr)?) {
                (t, e) if t == e => Some(t),
                _ => None,
            },
        },
        _ => None,
    }
}

/// One reason per `when` clause that is always false and per `unless`
/// clause that is always true.
pub(crate) fn impossible_conditions(
    p: &Policy,
) -> impl Iterator<Item = ImpossiblePolicyReason> + '_ {
    p.conditions()
        .filter_map(|clause| match (clause.kind(), constant_bool(clause.body())) {
            (ClauseKind::When, Some(false)) => Some(ImpossiblePolicyReason::WhenAlwaysFalse),
            (ClauseKind::Unless, Some(true)) => Some(ImpossiblePolicyReason::UnlessAlwaysTrue),
            _ => None,
        })
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{Clause, Effect, PolicyID, Var};

    fn principal_attr() -> Expr {
        Expr::get_attr(Expr::var(Var::Principal), "flag")
    }

    #[test]
    fn literals_and_negation() {
        assert_eq!(constant_bool(&Expr::val(true)), Some(true));
        assert_eq!(constant_bool(&Expr::not(Expr::val(true))), Some(false));
        assert_eq!(constant_bool(&Expr::val(1)), None);
        assert_eq!(constant_bool(&Expr::not(principal_attr())), None);
    }

    #[test]
    fn short_circuits() {
        assert_eq!(
            constant_bool(&Expr::and(Expr::val(false), principal_attr())),
            Some(false)
        );
        assert_eq!(
            constant_bool(&Expr::or(Expr::val(true), principal_attr())),
            Some(true)
        );
        assert_eq!(
            constant_bool(&Expr::and(Expr::val(true), principal_attr())),
            None
        );
        // only the left operand short circuits
        assert_eq!(
            constant_bool(&Expr::and(principal_attr(), Expr::val(false))),
            None
        );
        assert_eq!(
            constant_bool(&Expr::or(Expr::val(true), Expr::val(false))),
            Some(true)
        );
    }

    #[test]
    fn conditionals() {
        assert_eq!(
            constant_bool(&Expr::ite(Expr::val(true), Expr::val(false), principal_attr())),
            Some(false)
        );
        assert_eq!(
            constant_bool(&Expr::ite(principal_attr(), Expr::val(true), Expr::val(true))),
            Some(true)
        );
        assert_eq!(
            constant_bool(&Expr::ite(principal_attr(), Expr::val(true), Expr::val(false))),
            None
        );
    }

    #[test]
    fn impossible_clauses() {
        let p = Policy::new(PolicyID::from_string("p"), Effect::Permit)
            .with_condition(Clause::when(Expr::val(true)))
            .with_condition(Clause::unless(Expr::or(Expr::val(true), Expr::val(false))))
            .with_condition(Clause::when(Expr::and(Expr::val(false), principal_attr())))
            .with_condition(Clause::unless(Expr::val(false)));
        assert_eq!(
            impossible_conditions(&p).collect::<Vec<_>>(),
            vec![
                ImpossiblePolicyReason::UnlessAlwaysTrue,
                ImpossiblePolicyReason::WhenAlwaysFalse
            ]
        );
    }
}
