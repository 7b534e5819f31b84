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

//! Defines errors returned by the validator.

use miette::Diagnostic;
use thiserror::Error;

use std::collections::BTreeSet;
use std::fmt::Display;

use crate::ast::{EntityType, EntityUID, PolicyID};
use crate::fuzzy_match::fuzzy_search;
use crate::validator::types::{ExtensionName, Type};
use crate::validator::ValidatorSchema;
use itertools::Itertools;
use smol_str::SmolStr;

/// Structure containing details about an unrecognized entity type error.
#[derive(Debug, Clone, Error, Hash, Eq, PartialEq)]
#[error("for policy `{policy_id}`, unrecognized entity type `{actual_entity_type}`")]
pub struct UnrecognizedEntityType {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// The entity type seen in the policy.
    pub actual_entity_type: EntityType,
    /// An entity type from the schema that the user might reasonably have
    /// intended to write.
    pub suggested_entity_type: Option<String>,
}

impl Diagnostic for UnrecognizedEntityType {
    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.suggested_entity_type
            .as_ref()
            .map(|s| Box::new(format!("did you mean `{s}`?")) as Box<dyn Display>)
    }
}

impl UnrecognizedEntityType {
    pub(crate) fn new(
        policy_id: PolicyID,
        actual_entity_type: EntityType,
        schema: &ValidatorSchema,
    ) -> Self {
        let known = schema.entity_type_names().map(ToString::to_string).collect_vec();
        Self {
            suggested_entity_type: fuzzy_search(actual_entity_type.as_str(), &known),
            policy_id,
            actual_entity_type,
        }
    }
}

/// Structure containing details about an unrecognized action id error.
#[derive(Debug, Clone, Error, Hash, Eq, PartialEq)]
#[error("for policy `{policy_id}`, unrecognized action `{actual_action_id}`")]
pub struct UnrecognizedActionId {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// Action Id seen in the policy
    pub actual_action_id: EntityUID,
    /// Hint for resolving the error
    pub hint: Option<UnrecognizedActionIdHelp>,
}

impl Diagnostic for UnrecognizedActionId {
    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.hint
            .as_ref()
            .map(|help| Box::new(help) as Box<dyn std::fmt::Display>)
    }
}

impl UnrecognizedActionId {
    pub(crate) fn new(
        policy_id: PolicyID,
        actual_action_id: EntityUID,
        schema: &ValidatorSchema,
    ) -> Self {
        Self {
            hint: unrecognized_action_id_help(&actual_action_id, schema),
            policy_id,
            actual_action_id,
        }
    }
}

/// Help for resolving an unrecognized action id error
#[derive(Debug, Clone, Error, Hash, Eq, PartialEq)]
pub enum UnrecognizedActionIdHelp {
    /// Draw attention to action id including action type (e.g., `Action::"Action::view"`)
    #[error("did you intend to include the type in action `{0}`?")]
    AvoidActionTypeInActionId(String),
    /// Suggest an alternative action
    #[error("did you mean `{0}`?")]
    SuggestAlternative(String),
}

/// Determine the help to offer in the presence of an unrecognized action id error.
fn unrecognized_action_id_help(
    euid: &EntityUID,
    schema: &ValidatorSchema,
) -> Option<UnrecognizedActionIdHelp> {
    // an id like `Action::view` usually means the type was written twice
    if let Some(stripped) = euid.eid().strip_prefix("Action::") {
        let stripped = stripped.trim_matches('"');
        if let Some(id) = schema
            .action_ids()
            .find(|action| action.name().eid() == stripped)
        {
            return Some(UnrecognizedActionIdHelp::AvoidActionTypeInActionId(
                id.name().to_string(),
            ));
        }
    }
    let ids = schema
        .action_ids()
        .map(|action| action.name().eid().to_owned())
        .collect_vec();
    fuzzy_search(euid.eid(), &ids).map(|eid| {
        UnrecognizedActionIdHelp::SuggestAlternative(
            EntityUID::new(euid.entity_type().clone(), eid).to_string(),
        )
    })
}

/// A policy that can never apply to any request
#[derive(Debug, Clone, Error, Hash, Eq, PartialEq)]
#[error("for policy `{policy_id}`, policy is impossible: {reason}")]
pub struct ImpossiblePolicy {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// Why no request can satisfy the policy
    pub reason: ImpossiblePolicyReason,
}

impl Diagnostic for ImpossiblePolicy {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match &self.reason {
            ImpossiblePolicyReason::ActionWithoutAppliesTo(action) => Some(Box::new(format!(
                "declare `principalTypes` and `resourceTypes` for `{action}` in the schema"
            ))),
            ImpossiblePolicyReason::UnsupportedCombination => Some(Box::new(
                "each scope is allowed by some action, but never by the same action",
            )),
            _ => None,
        }
    }
}

/// Which side of the policy scope a diagnostic refers to
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ScopeSide {
    /// The principal scope
    Principal,
    /// The resource scope
    Resource,
    /// Both the principal and the resource scope
    Both,
}

impl Display for ScopeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Principal => write!(f, "principal scope"),
            Self::Resource => write!(f, "resource scope"),
            Self::Both => write!(f, "principal and resource scopes"),
        }
    }
}

/// The ways a policy can be impossible
#[derive(Debug, Clone, Error, Hash, Eq, PartialEq)]
pub enum ImpossiblePolicyReason {
    /// No action in the schema applies to any principal and resource
    #[error("no action in the schema applies to both a principal type and a resource type")]
    NoApplicableActions,
    /// The action in the scope has no `appliesTo`
    #[error("action `{0}` does not apply to any principal and resource types")]
    ActionWithoutAppliesTo(EntityUID),
    /// `action in []`
    #[error("the action scope is an empty set")]
    EmptyActionSet,
    /// None of the listed actions applies to anything
    #[error("none of the actions in the scope apply to any principal and resource types")]
    NoListedActionApplies,
    /// The scope names types none of the candidate actions allow
    #[error("the types in the {0} are not allowed by any action in the scope")]
    ScopeTypeNotAllowed(ScopeSide),
    /// Each side is allowed by some action, but no single action allows both
    #[error("no action supports this principal/resource combination")]
    UnsupportedCombination,
    /// An `in` scope names an entity no allowed type can be a member of
    #[error("no entity type allowed for the {side} can be a member of an entity of type `{target}`")]
    InTargetUnreachable {
        /// The side with the `in` constraint
        side: ScopeSide,
        /// Type of the `in` target
        target: EntityType,
    },
    /// `when { false }`
    #[error("a `when` condition always evaluates to false")]
    WhenAlwaysFalse,
    /// `unless { true }`
    #[error("an `unless` condition always evaluates to true")]
    UnlessAlwaysTrue,
}

/// Structure containing details about an unexpected type error.
#[derive(Error, Debug, Clone, Hash, PartialEq, Eq)]
#[error("for policy `{policy_id}`, unexpected type: expected {} but saw {}",
    match .expected.iter().next() {
        Some(single) if .expected.len() == 1 => format!("{}", single),
        _ => .expected.iter().join(", or ")
    },
    .actual)]
pub struct UnexpectedType {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// Type(s) which were expected
    pub expected: Vec<Type>,
    /// Type which was encountered
    pub actual: Type,
    /// Optional help for resolving the error
    pub help: Option<UnexpectedTypeHelp>,
}

impl Diagnostic for UnexpectedType {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.help.as_ref().map(|h| Box::new(h) as Box<dyn Display>)
    }
}

/// Help for resolving a type error
#[derive(Error, Debug, Clone, Hash, Eq, PartialEq)]
pub enum UnexpectedTypeHelp {
    /// Conditions must be booleans
    #[error("policy conditions must evaluate to a boolean")]
    ConditionNotBool,
    /// An attribute declared without a type cannot be a condition
    #[error("the schema declares this value without a type, so it cannot be used as a boolean")]
    UnspecifiedNotBool,
    /// Try using `like`
    #[error("try using `like` to examine the contents of a string")]
    TryUsingLike,
    /// Try using `contains`, `containsAny`, or `containsAll`
    #[error(
        "try using `contains`, `containsAny`, or `containsAll` to examine the contents of a set"
    )]
    TryUsingContains,
    /// Cedar doesn't support string concatenation
    #[error("Cedar does not support string concatenation")]
    ConcatenationNotSupported,
}

/// An operator applied to operands of the wrong type
#[derive(Error, Debug, Clone, Hash, PartialEq, Eq)]
#[error("for policy `{policy_id}`, {requirement}, but saw {actual}")]
pub struct InvalidOperand {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// What the operator requires
    pub requirement: OperandRequirement,
    /// Type of the offending operand
    pub actual: Type,
}

impl Diagnostic for InvalidOperand {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match (&self.requirement, &self.actual) {
            (OperandRequirement::Arithmetic, Type::String) => {
                Some(Box::new(UnexpectedTypeHelp::ConcatenationNotSupported))
            }
            (OperandRequirement::Comparison, Type::Extension(ExtensionName::Decimal)) => {
                Some(Box::new("use `.lessThan()` and friends to compare decimals"))
            }
            (OperandRequirement::InLeft | OperandRequirement::InRight, Type::Set(_)) => {
                Some(Box::new(UnexpectedTypeHelp::TryUsingContains))
            }
            (OperandRequirement::InLeft | OperandRequirement::InRight, Type::String) => {
                Some(Box::new(UnexpectedTypeHelp::TryUsingLike))
            }
            _ => None,
        }
    }
}

/// Operand type requirements of the builtin operators
#[derive(Error, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum OperandRequirement {
    /// `&&`, `||`, `!`
    #[error("boolean operator requires boolean operands")]
    Boolean,
    /// `+`, `-`, `*`, unary `-`
    #[error("arithmetic operator requires Long operands")]
    Arithmetic,
    /// `<`, `<=`, `>`, `>=`
    #[error("comparison operator requires Long operands")]
    Comparison,
    /// Left of `in`
    #[error("left operand of 'in' operator must be entity")]
    InLeft,
    /// Right of `in`
    #[error("right operand of 'in' operator must be entity or set of entities")]
    InRight,
    /// Operand of `is`
    #[error("operand of 'is' operator must be entity")]
    Is,
    /// First operand of `contains` and friends
    #[error("'contains' operators require a set as their first operand")]
    Set,
    /// Second operand of `containsAll`/`containsAny`
    #[error("'containsAll' and 'containsAny' require a set as their second operand")]
    SetArgument,
    /// `isEmpty`
    #[error("'isEmpty' requires a set operand")]
    IsEmpty,
    /// `like`
    #[error("'like' requires a String operand")]
    Like,
    /// Target of `has`
    #[error("'has' requires an entity or record operand")]
    Has,
    /// Target of `getTag`/`hasTag`
    #[error("tag operators require an entity operand")]
    TagTarget,
    /// Tag name of `getTag`/`hasTag`
    #[error("tag operators require a String tag")]
    TagName,
}

/// Structure containing details about an incompatible type error.
#[derive(Error, Debug, Clone, Hash, PartialEq, Eq)]
pub struct IncompatibleTypes {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// Types which are incompatible
    pub types: BTreeSet<Type>,
    /// Hint for resolving the error
    pub hint: LubHelp,
    /// `LubContext` for the error
    pub context: LubContext,
}

impl Diagnostic for IncompatibleTypes {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(format!(
            "{} must have compatible types. {}",
            self.context, self.hint
        )))
    }
}

impl Display for IncompatibleTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "for policy `{}`, ", self.policy_id)?;
        if self.context == LubContext::Set {
            write!(f, "incompatible set element types: ")?;
        }
        write!(
            f,
            "the types {} are not compatible",
            self.types.iter().map(|t| format!("`{t}`")).join(" and ")
        )
    }
}

/// Hints for resolving an incompatible-types error
#[derive(Error, Debug, Clone, Hash, Eq, PartialEq)]
pub enum LubHelp {
    /// A shared attribute has types that do not match in either direction
    #[error("Attribute `{0}` has incompatible types in the two records")]
    AttributeType(SmolStr),
    /// Width subtyping
    #[error("Attribute `{0}` appears in only one of the records, and the other record is closed")]
    RecordWidth(SmolStr),
    /// Values of these categories are never equal
    #[error("Values of these types can never be equal")]
    Category,
    /// Catchall
    #[error("Types must match to be compatible")]
    None,
}

/// Text describing where the incompatible-types error was found
#[derive(Error, Debug, Clone, Hash, Eq, PartialEq)]
pub enum LubContext {
    /// In the elements of a set
    #[error("elements of a set")]
    Set,
    /// In the operands to `==`
    #[error("both operands to a `==` expression")]
    Equality,
    /// In the operands of `contains`
    #[error("elements of the first operand and the second operand to a `contains` expression")]
    Contains,
    /// In the operand of `containsAny` or `containsAll`
    #[error("elements of both set operands to a `containsAll` or `containsAny` expression")]
    ContainsAnyAll,
}

/// Structure containing details about a missing attribute error.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Error)]
#[error("for policy `{policy_id}`, attribute {attribute_access} not found")]
pub struct UnsafeAttributeAccess {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// More details about the missing-attribute error
    pub attribute_access: AttributeAccess,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
}

impl Diagnostic for UnsafeAttributeAccess {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.suggestion
            .as_ref()
            .map(|s| Box::new(format!("did you mean `{s}`?")) as Box<dyn Display>)
    }
}

/// Where an attribute was looked up
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum AttributeAccess {
    /// On an entity of this type
    Entity(EntityType, SmolStr),
    /// In the context of this action
    Context(EntityUID, SmolStr),
    /// On a record value
    Record(SmolStr),
}

impl AttributeAccess {
    /// The name of the attribute that was looked up
    pub fn attr(&self) -> &SmolStr {
        match self {
            Self::Entity(_, attr) | Self::Context(_, attr) | Self::Record(attr) => attr,
        }
    }
}

impl Display for AttributeAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity(ty, attr) => write!(f, "`{attr}` on entity type `{ty}`"),
            Self::Context(action, attr) => write!(f, "`{attr}` in context for {action}"),
            Self::Record(attr) => write!(f, "`{attr}`"),
        }
    }
}

/// Attribute access on an entity type the schema does not declare
#[derive(Debug, Clone, Hash, PartialEq, Eq, Error, Diagnostic)]
#[error("for policy `{policy_id}`, cannot access attribute `{attr}`: entity type `{entity_type}` does not exist in the schema")]
pub struct UndeclaredEntityTypeAccess {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// The undeclared entity type
    pub entity_type: EntityType,
    /// The attribute
    pub attr: SmolStr,
}

/// Attribute access on something that is neither an entity nor a record
#[derive(Debug, Clone, Hash, PartialEq, Eq, Error, Diagnostic)]
#[error("for policy `{policy_id}`, cannot access attribute `{attr}` on a value of type {actual}")]
#[diagnostic(help("only entities and records have attributes"))]
pub struct AttributeAccessOnNonRecord {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// The attribute
    pub attr: SmolStr,
    /// Type of the value being accessed
    pub actual: Type,
}

/// Structure containing details about a wrong number of arguments error.
#[derive(Error, Debug, Clone, Hash, PartialEq, Eq, Diagnostic)]
#[error("for policy `{policy_id}`, wrong number of arguments in extension function application `{name}`. Expected {expected}, got {actual}")]
pub struct WrongNumberArguments {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// Name of the extension function
    pub name: SmolStr,
    /// Expected number of arguments
    pub expected: usize,
    /// Actual number of arguments
    pub actual: usize,
}

/// A string literal passed to an extension constructor that the constructor
/// would reject
#[derive(Debug, Clone, Hash, Eq, PartialEq, Error)]
#[error("for policy `{policy_id}`, invalid `{kind}` literal \"{literal}\"")]
pub struct InvalidExtensionLiteral {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// Extension type being constructed
    pub kind: ExtensionName,
    /// The literal text
    pub literal: SmolStr,
    /// Why the literal was rejected
    pub msg: String,
}

impl Diagnostic for InvalidExtensionLiteral {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(&self.msg))
    }
}

/// Structure containing details about entity dereference level violation
#[derive(Debug, Clone, Hash, Eq, PartialEq, Error)]
#[error("for policy `{policy_id}`, attribute access exceeds maximum level: this policy requires level {actual_level}, which exceeds the maximum allowed level ({allowed_level})")]
pub struct EntityDerefLevelViolation {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
    /// The maximum level allowed
    pub allowed_level: u32,
    /// The level this policy reached
    pub actual_level: u32,
}

impl Diagnostic for EntityDerefLevelViolation {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(
            "each attribute access on an entity or record counts as one level",
        ))
    }
}

/// Expression nesting too deep to typecheck
#[derive(Debug, Clone, Hash, Eq, PartialEq, Error, Diagnostic)]
#[error("for policy `{policy_id}`, expression is nested too deeply to validate")]
pub struct RecursionLimit {
    /// Policy ID where the error occurred
    pub policy_id: PolicyID,
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn schema() -> ValidatorSchema {
        ValidatorSchema::from_json_value(json!({
            "PhotoApp": {
                "entityTypes": { "User": {}, "Photo": {} },
                "actions": { "view": {}, "edit": {} }
            }
        }))
        .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn entity_type_suggestion() {
        let err = UnrecognizedEntityType::new(
            PolicyID::from_string("p0"),
            EntityType::new("PhotoApp::Usr"),
            &schema(),
        );
        assert_eq!(
            err.to_string(),
            "for policy `p0`, unrecognized entity type `PhotoApp::Usr`"
        );
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("did you mean `PhotoApp::User`?".to_string())
        );
    }

    #[test]
    fn action_suggestions() {
        let err = UnrecognizedActionId::new(
            PolicyID::from_string("p0"),
            EntityUID::new("PhotoApp::Action", "veiw"),
            &schema(),
        );
        assert_eq!(
            err.hint,
            Some(UnrecognizedActionIdHelp::SuggestAlternative(
                r#"PhotoApp::Action::"view""#.to_string()
            ))
        );
        let err = UnrecognizedActionId::new(
            PolicyID::from_string("p0"),
            EntityUID::new("PhotoApp::Action", "Action::\"edit\""),
            &schema(),
        );
        assert_eq!(
            err.hint,
            Some(UnrecognizedActionIdHelp::AvoidActionTypeInActionId(
                r#"PhotoApp::Action::"edit""#.to_string()
            ))
        );
    }

    #[test]
    fn messages() {
        let id = PolicyID::from_string("policy0");
        let err = ImpossiblePolicy {
            policy_id: id.clone(),
            reason: ImpossiblePolicyReason::ScopeTypeNotAllowed(ScopeSide::Both),
        };
        assert_eq!(
            err.to_string(),
            "for policy `policy0`, policy is impossible: the types in the principal and resource scopes are not allowed by any action in the scope"
        );
        let err = InvalidOperand {
            policy_id: id.clone(),
            requirement: OperandRequirement::Arithmetic,
            actual: Type::String,
        };
        assert_eq!(
            err.to_string(),
            "for policy `policy0`, arithmetic operator requires Long operands, but saw String"
        );
        assert!(err.help().is_some());
        let err = IncompatibleTypes {
            policy_id: id.clone(),
            types: BTreeSet::from([Type::Long, Type::String]),
            hint: LubHelp::None,
            context: LubContext::Set,
        };
        assert_eq!(
            err.to_string(),
            "for policy `policy0`, incompatible set element types: the types `Long` and `String` are not compatible"
        );
        let err = UnexpectedType {
            policy_id: id,
            expected: vec![Type::Bool],
            actual: Type::Long,
            help: Some(UnexpectedTypeHelp::ConditionNotBool),
        };
        assert_eq!(
            err.to_string(),
            "for policy `policy0`, unexpected type: expected Bool but saw Long"
        );
    }
}
