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

use super::{Expr, ExprKind};

/// This structure implements the iterator used to traverse subexpressions of
/// an expression, including the expression itself.
#[derive(Debug)]
pub struct ExprIterator<'a> {
    /// The stack of expressions that need to be visited. To get the next
    /// expression, the iterator will pop from the stack. If the stack is
    /// empty, then the iterator is finished. Otherwise, any subexpressions of
    /// that expression are then pushed onto the stack, and the popped
    /// expression is returned.
    expression_stack: Vec<&'a Expr>,
}

impl<'a> ExprIterator<'a> {
    /// Construct an expr iterator
    pub fn new(expr: &'a Expr) -> Self {
        Self {
            expression_stack: vec![expr],
        }
    }
}

impl<'a> Iterator for ExprIterator<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let next_expr = self.expression_stack.pop()?;
        match next_expr.expr_kind() {
            ExprKind::Lit(_) | ExprKind::Var(_) => (),
            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => {
                self.expression_stack.push(test_expr);
                self.expression_stack.push(then_expr);
                self.expression_stack.push(else_expr);
            }
            ExprKind::And { left, right } | ExprKind::Or { left, right } => {
                self.expression_stack.push(left);
                self.expression_stack.push(right);
            }
            ExprKind::UnaryApp { arg, .. } => {
                self.expression_stack.push(arg);
            }
            ExprKind::BinaryApp { arg1, arg2, .. } => {
                self.expression_stack.push(arg1);
                self.expression_stack.push(arg2);
            }
            ExprKind::GetAttr { expr, .. }
            | ExprKind::HasAttr { expr, .. }
            | ExprKind::Like { expr, .. }
            | ExprKind::Is { expr, .. } => {
                self.expression_stack.push(expr);
            }
            ExprKind::IsIn { expr, in_expr, .. } => {
                self.expression_stack.push(expr);
                self.expression_stack.push(in_expr);
            }
            ExprKind::ExtensionFunctionApp { args: elems, .. } | ExprKind::Set(elems) => {
                self.expression_stack.extend(elems);
            }
            ExprKind::Record(map) => {
                self.expression_stack.extend(map.values());
            }
        }
        Some(next_expr)
    }
}

impl Expr {
    /// Iterate over all of the subexpressions of this expression, including
    /// the expression itself. The order is unspecified.
    pub fn subexpressions(&self) -> ExprIterator<'_> {
        ExprIterator::new(self)
    }
}
