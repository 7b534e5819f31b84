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

//! Static validation of Cedar policies, entities and requests against a
//! JSON schema.
//!
//! Build a [`validator::Validator`] once from a schema, then check parsed
//! policies with `validate_policies`, entity data with `validate_entities`
//! and individual requests with `validate_request`.
#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_docs, missing_debug_implementations)]
#![allow(clippy::result_large_err, clippy::large_enum_variant)] // see #878

pub mod ast;
pub mod entities;
mod fuzzy_match;
pub mod validator;
