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

//! Type information and literal grammar for the Cedar 'decimal' extension.

use regex::Regex;

use super::ExtensionFunctionType;
use crate::validator::types::{ExtensionName, Type};

/// Number of digits supported after the decimal
const NUM_DIGITS: u32 = 4;

// PANIC SAFETY This is a valid `Regex`
#[allow(clippy::unwrap_used)]
mod constants {
    use super::Regex;

    lazy_static::lazy_static! {
        pub static ref DECIMAL_REGEX : Regex = Regex::new(r"^(-?\d+)\.(\d+)$").unwrap();
    }
}

/// Computes x * 10 ^ y while checking for overflows
fn checked_mul_pow(x: i64, y: u32) -> Option<i64> {
    i64::checked_pow(10, y).and_then(|z| x.checked_mul(z))
}

/// Parse a decimal literal into its value scaled by `10 ^ NUM_DIGITS`.
///
/// The literal must have digits on both sides of the point, at most
/// `NUM_DIGITS` digits after it, and must fit in an `i64` once scaled.
pub fn parse_decimal(s: &str) -> Result<i64, String> {
    let caps = constants::DECIMAL_REGEX
        .captures(s)
        .ok_or_else(|| format!("`{s}` is not a well-formed decimal value"))?;
    let (Some(l), Some(r)) = (caps.get(1), caps.get(2)) else {
        return Err(format!("`{s}` is not a well-formed decimal value"));
    };
    let (l, r) = (l.as_str(), r.as_str());
    let len = u32::try_from(r.len()).map_err(|_| "overflow when converting to decimal".to_string())?;
    if len > NUM_DIGITS {
        return Err(format!(
            "too many digits after the decimal in `{s}`; at most {NUM_DIGITS} are supported"
        ));
    }
    let overflow = || "overflow when converting to decimal".to_string();
    let l = l
        .parse::<i64>()
        .ok()
        .and_then(|l| checked_mul_pow(l, NUM_DIGITS))
        .ok_or_else(overflow)?;
    let r = r
        .parse::<i64>()
        .ok()
        .and_then(|r| checked_mul_pow(r, NUM_DIGITS - len))
        .ok_or_else(overflow)?;
    if s.starts_with('-') {
        l.checked_sub(r)
    } else {
        l.checked_add(r)
    }
    .ok_or_else(overflow)
}

fn check_decimal_literal(s: &str) -> Result<(), String> {
    parse_decimal(s).map(|_| ())
}

/// Functions of the decimal extension
pub fn extension_schema() -> Vec<ExtensionFunctionType> {
    let decimal = Type::Extension(ExtensionName::Decimal);
    let comparison = |name| {
        ExtensionFunctionType::function(name, vec![decimal.clone(), decimal.clone()], Type::Bool)
    };
    vec![
        ExtensionFunctionType::constructor(
            "decimal",
            ExtensionName::Decimal,
            check_decimal_literal,
        ),
        comparison("lessThan"),
        comparison("lessThanOrEqual"),
        comparison("greaterThan"),
        comparison("greaterThanOrEqual"),
    ]
}
