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

use super::{EntityType, EntityUID};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Built-in variables available in a policy condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Var {
    /// the Principal of the given request
    Principal,
    /// the Action of the given request
    Action,
    /// the Resource of the given request
    Resource,
    /// the Context of the given request
    Context,
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Principal => write!(f, "principal"),
            Self::Action => write!(f, "action"),
            Self::Resource => write!(f, "resource"),
            Self::Context => write!(f, "context"),
        }
    }
}

/// First-class values which may appear as literals in a policy condition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Long(i64),
    /// String value
    String(SmolStr),
    /// Entity, represented by its UID
    EntityUID(EntityUID),
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Self::Long(i)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<SmolStr> for Literal {
    fn from(s: SmolStr) -> Self {
        Self::String(s)
    }
}

impl From<EntityUID> for Literal {
    fn from(e: EntityUID) -> Self {
        Self::EntityUID(e)
    }
}

/// Built-in operators with exactly one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical negation
    Not,
    /// Integer negation
    Neg,
    /// `isEmpty()` on a set
    IsEmpty,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::IsEmpty => write!(f, "isEmpty"),
        }
    }
}

/// Built-in operators with exactly two arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// Integer addition
    Add,
    /// Integer subtraction
    Sub,
    /// Integer multiplication
    Mul,
    /// Hierarchy membership. Second argument is an entity or a set of
    /// entities.
    In,
    /// Set membership
    Contains,
    /// First set contains every element of the second
    ContainsAll,
    /// First set contains at least one element of the second
    ContainsAny,
    /// Get a tag of an entity
    GetTag,
    /// Does an entity have a tag
    HasTag,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::NotEq => write!(f, "!="),
            BinaryOp::Less => write!(f, "<"),
            BinaryOp::LessEq => write!(f, "<="),
            BinaryOp::Greater => write!(f, ">"),
            BinaryOp::GreaterEq => write!(f, ">="),
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::In => write!(f, "in"),
            BinaryOp::Contains => write!(f, "contains"),
            BinaryOp::ContainsAll => write!(f, "containsAll"),
            BinaryOp::ContainsAny => write!(f, "containsAny"),
            BinaryOp::GetTag => write!(f, "getTag"),
            BinaryOp::HasTag => write!(f, "hasTag"),
        }
    }
}

/// Internal AST for expressions used in policy conditions.
///
/// The validator only reads this tree. Constructing it from policy text is
/// the job of a parser living outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    expr_kind: ExprKind,
}

/// The possible expression variants. This enum should be matched on by code
/// recursively traversing the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// Literal value
    Lit(Literal),
    /// Variable
    Var(Var),
    /// Ternary expression
    If {
        /// Condition for the ternary expression. Must evaluate to Bool type
        test_expr: Box<Expr>,
        /// Value if true
        then_expr: Box<Expr>,
        /// Value if false
        else_expr: Box<Expr>,
    },
    /// Boolean AND
    And {
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Boolean OR
    Or {
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Application of a built-in unary operator (single parameter)
    UnaryApp {
        /// Unary operator to apply
        op: UnaryOp,
        /// Argument to apply operator to
        arg: Box<Expr>,
    },
    /// Application of a built-in binary operator (two parameters)
    BinaryApp {
        /// Binary operator to apply
        op: BinaryOp,
        /// First arg
        arg1: Box<Expr>,
        /// Second arg
        arg2: Box<Expr>,
    },
    /// Application of an extension function to n arguments. Functions called
    /// with method syntax (`a.isInRange(b)`) put the receiver first.
    ExtensionFunctionApp {
        /// Extension function to apply
        fn_name: SmolStr,
        /// Args to apply the function to
        args: Vec<Expr>,
    },
    /// Get an attribute of an entity, or a field of a record
    GetAttr {
        /// Expression to get an attribute/field of
        expr: Box<Expr>,
        /// Attribute or field to get
        attr: SmolStr,
    },
    /// Does the given `expr` have the given `attr`?
    HasAttr {
        /// Expression to test
        expr: Box<Expr>,
        /// Attribute or field to check for
        attr: SmolStr,
    },
    /// Regex-like string matching similar to IAM's `StringLike` operator
    Like {
        /// Expression to test
        expr: Box<Expr>,
        /// Pattern to match on
        pattern: SmolStr,
    },
    /// Entity type test. Does the first argument have the entity type
    /// specified by the second argument.
    Is {
        /// Expression to test
        expr: Box<Expr>,
        /// The entity type
        entity_type: EntityType,
    },
    /// Combined entity type and hierarchy test, `expr is T in in_expr`
    IsIn {
        /// Expression to test
        expr: Box<Expr>,
        /// The entity type
        entity_type: EntityType,
        /// Entity or set of entities for the membership test
        in_expr: Box<Expr>,
    },
    /// Set (whose elements may be arbitrary expressions)
    Set(Vec<Expr>),
    /// Anonymous record (whose elements may be arbitrary expressions)
    Record(BTreeMap<SmolStr, Expr>),
}

impl From<ExprKind> for Expr {
    fn from(expr_kind: ExprKind) -> Self {
        Self { expr_kind }
    }
}

impl Expr {
    /// Access the inner `ExprKind` for this `Expr`
    pub fn expr_kind(&self) -> &ExprKind {
        &self.expr_kind
    }

    /// Create an `Expr` that's just a single `Literal`.
    pub fn val(v: impl Into<Literal>) -> Self {
        ExprKind::Lit(v.into()).into()
    }

    /// Create an `Expr` that's just this literal `Var`
    pub fn var(v: Var) -> Self {
        ExprKind::Var(v).into()
    }

    /// Create a ternary (if-then-else) `Expr`.
    pub fn ite(test_expr: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        ExprKind::If {
            test_expr: Box::new(test_expr),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
        .into()
    }

    /// Create a 'not' expression
    pub fn not(e: Expr) -> Self {
        Self::unary_app(UnaryOp::Not, e)
    }

    /// Create a `-` expression
    pub fn neg(e: Expr) -> Self {
        Self::unary_app(UnaryOp::Neg, e)
    }

    /// Create an `isEmpty` expression
    pub fn is_empty(e: Expr) -> Self {
        Self::unary_app(UnaryOp::IsEmpty, e)
    }

    /// Create an 'and' expression
    pub fn and(left: Expr, right: Expr) -> Self {
        ExprKind::And {
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    /// Create an 'or' expression
    pub fn or(left: Expr, right: Expr) -> Self {
        ExprKind::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    /// Create an application of a unary operator
    pub fn unary_app(op: UnaryOp, arg: Expr) -> Self {
        ExprKind::UnaryApp {
            op,
            arg: Box::new(arg),
        }
        .into()
    }

    /// Create an application of a binary operator
    pub fn binary_app(op: BinaryOp, arg1: Expr, arg2: Expr) -> Self {
        ExprKind::BinaryApp {
            op,
            arg1: Box::new(arg1),
            arg2: Box::new(arg2),
        }
        .into()
    }

    /// Create an `==` expression
    pub fn is_eq(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Eq, e1, e2)
    }

    /// Create a `!=` expression
    pub fn noteq(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::NotEq, e1, e2)
    }

    /// Create a `<` expression
    pub fn less(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Less, e1, e2)
    }

    /// Create a `<=` expression
    pub fn lesseq(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::LessEq, e1, e2)
    }

    /// Create a `>` expression
    pub fn greater(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Greater, e1, e2)
    }

    /// Create a `>=` expression
    pub fn greatereq(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::GreaterEq, e1, e2)
    }

    /// Create an integer `+` expression
    pub fn add(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Add, e1, e2)
    }

    /// Create an integer `-` expression
    pub fn sub(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Sub, e1, e2)
    }

    /// Create an integer `*` expression
    pub fn mul(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Mul, e1, e2)
    }

    /// Create an `in` expression
    pub fn is_in(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::In, e1, e2)
    }

    /// Create a `contains` expression
    pub fn contains(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::Contains, e1, e2)
    }

    /// Create a `containsAll` expression
    pub fn contains_all(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::ContainsAll, e1, e2)
    }

    /// Create a `containsAny` expression
    pub fn contains_any(e1: Expr, e2: Expr) -> Self {
        Self::binary_app(BinaryOp::ContainsAny, e1, e2)
    }

    /// Create a `getTag` expression
    pub fn get_tag(expr: Expr, tag: Expr) -> Self {
        Self::binary_app(BinaryOp::GetTag, expr, tag)
    }

    /// Create a `hasTag` expression
    pub fn has_tag(expr: Expr, tag: Expr) -> Self {
        Self::binary_app(BinaryOp::HasTag, expr, tag)
    }

    /// Create an extension function call
    pub fn call_extension_fn(fn_name: impl Into<SmolStr>, args: Vec<Expr>) -> Self {
        ExprKind::ExtensionFunctionApp {
            fn_name: fn_name.into(),
            args,
        }
        .into()
    }

    /// Create an attribute access
    pub fn get_attr(expr: Expr, attr: impl Into<SmolStr>) -> Self {
        ExprKind::GetAttr {
            expr: Box::new(expr),
            attr: attr.into(),
        }
        .into()
    }

    /// Create a `has` expression
    pub fn has_attr(expr: Expr, attr: impl Into<SmolStr>) -> Self {
        ExprKind::HasAttr {
            expr: Box::new(expr),
            attr: attr.into(),
        }
        .into()
    }

    /// Create a `like` expression
    pub fn like(expr: Expr, pattern: impl Into<SmolStr>) -> Self {
        ExprKind::Like {
            expr: Box::new(expr),
            pattern: pattern.into(),
        }
        .into()
    }

    /// Create an `is` expression
    pub fn is_entity_type(expr: Expr, entity_type: impl Into<EntityType>) -> Self {
        ExprKind::Is {
            expr: Box::new(expr),
            entity_type: entity_type.into(),
        }
        .into()
    }

    /// Create an `is ... in` expression
    pub fn is_in_entity_type(
        expr: Expr,
        entity_type: impl Into<EntityType>,
        in_expr: Expr,
    ) -> Self {
        ExprKind::IsIn {
            expr: Box::new(expr),
            entity_type: entity_type.into(),
            in_expr: Box::new(in_expr),
        }
        .into()
    }

    /// Create a set literal
    pub fn set(exprs: impl IntoIterator<Item = Expr>) -> Self {
        ExprKind::Set(exprs.into_iter().collect()).into()
    }

    /// Create a record literal
    pub fn record(pairs: impl IntoIterator<Item = (SmolStr, Expr)>) -> Self {
        ExprKind::Record(pairs.into_iter().collect()).into()
    }
}
