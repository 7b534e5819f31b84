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

//! This module contains type information for all of the standard Cedar extensions.

use std::collections::HashMap;

use crate::validator::types::{ExtensionName, Type};

pub mod datetime;
pub mod decimal;
pub mod ipaddr;

/// Checks the text passed to an extension constructor
pub type LiteralCheck = fn(&str) -> Result<(), String>;

/// Type signature of one extension function
#[derive(Debug, Clone)]
pub struct ExtensionFunctionType {
    name: &'static str,
    arg_types: Vec<Type>,
    return_type: Type,
    /// For constructors, the grammar their string argument must follow
    literal_check: Option<LiteralCheck>,
}

impl ExtensionFunctionType {
    /// A constructor taking one `String` and producing a value of `ext`
    pub(crate) fn constructor(name: &'static str, ext: ExtensionName, check: LiteralCheck) -> Self {
        Self {
            name,
            arg_types: vec![Type::String],
            return_type: Type::Extension(ext),
            literal_check: Some(check),
        }
    }

    /// Any other function: method-style calls count the receiver as the
    /// first argument
    pub(crate) fn function(name: &'static str, arg_types: Vec<Type>, return_type: Type) -> Self {
        Self {
            name,
            arg_types,
            return_type,
            literal_check: None,
        }
    }

    /// The function name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Argument types, in order
    pub fn arg_types(&self) -> &[Type] {
        &self.arg_types
    }

    /// Return type
    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// The extension type a constructor builds, if this is a constructor
    pub fn constructed_type(&self) -> Option<ExtensionName> {
        match (&self.return_type, self.literal_check) {
            (Type::Extension(ext), Some(_)) => Some(*ext),
            _ => None,
        }
    }

    /// Check a string literal argument against the constructor's grammar.
    /// Always succeeds for functions that are not constructors.
    pub fn check_literal(&self, literal: &str) -> Result<(), String> {
        match self.literal_check {
            Some(check) => check(literal),
            None => Ok(()),
        }
    }
}

lazy_static::lazy_static! {
    static ref ALL_EXTENSION_FUNCTIONS : HashMap<&'static str, ExtensionFunctionType> =
        [ipaddr::extension_schema(), decimal::extension_schema(), datetime::extension_schema()]
            .into_iter()
            .flatten()
            .map(|f| (f.name, f))
            .collect();
}

/// Look up an extension function by name
pub fn function_type(name: &str) -> Option<&'static ExtensionFunctionType> {
    ALL_EXTENSION_FUNCTIONS.get(name)
}

/// All known extension functions
pub fn all_function_types() -> impl Iterator<Item = &'static ExtensionFunctionType> {
    ALL_EXTENSION_FUNCTIONS.values()
}
