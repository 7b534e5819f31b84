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

use std::fmt::Display;

use crate::ast::EntityUID;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// Errors thrown when decoding entity or context JSON
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum JsonDeserializationError {
    /// Error thrown by the `serde_json` crate
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    /// An `__extn` escape names a function that does not construct an
    /// extension value
    #[error("{ctx}, `{name}` is not an extension constructor")]
    #[diagnostic(help("supported constructors are `ip`, `decimal`, `datetime` and `duration`"))]
    UnknownExtensionFunction {
        /// Context of this error
        ctx: Box<JsonDeserializationErrorContext>,
        /// The function named in the escape
        name: SmolStr,
    },
    /// The `arg` of an `__extn` escape is not a string
    #[error("{ctx}, the argument to extension constructor `{name}` must be a string")]
    ExtnArgNotString {
        /// Context of this error
        ctx: Box<JsonDeserializationErrorContext>,
        /// The constructor
        name: SmolStr,
    },
    /// The string passed to an extension constructor is not a valid literal
    #[error("{ctx}, invalid argument `{arg}` to `{name}`: {reason}")]
    InvalidExtensionLiteral {
        /// Context of this error
        ctx: Box<JsonDeserializationErrorContext>,
        /// The constructor
        name: SmolStr,
        /// The rejected literal
        arg: SmolStr,
        /// What is wrong with it
        reason: String,
    },
    /// JSON `null` is never a valid Cedar value
    #[error("{0}, found a `null`; JSON `null`s are not allowed in Cedar")]
    Null(Box<JsonDeserializationErrorContext>),
    /// Contexts need to be records, but we got some other JSON value
    #[error("expected context to be a record, but got {got}")]
    ContextNotRecord {
        /// JSON value we got instead
        got: Box<serde_json::Value>,
    },
}

impl JsonDeserializationError {
    pub(crate) fn null(ctx: &impl Fn() -> JsonDeserializationErrorContext) -> Self {
        Self::Null(Box::new(ctx()))
    }
}

/// Where in the input a [`JsonDeserializationError`] occurred
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonDeserializationErrorContext {
    /// The error occurred while decoding the attribute `attr` of an entity.
    EntityAttribute {
        /// Entity where the error occurred
        uid: EntityUID,
        /// Attribute where the error occurred
        attr: SmolStr,
    },
    /// The error occurred while decoding a request context
    Context,
}

impl Display for JsonDeserializationErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityAttribute { uid, attr } => write!(f, "in attribute `{attr}` on `{uid}`"),
            Self::Context => write!(f, "while parsing context"),
        }
    }
}
