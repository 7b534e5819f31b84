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

//! Type information and literal grammar for the Cedar 'ipaddr' extension.

use std::net::IpAddr;

use super::ExtensionFunctionType;
use crate::validator::types::{ExtensionName, Type};

/// Maximum prefix size for IpV4 addresses
const PREFIX_MAX_LEN_V4: u8 = 32;
/// Maximum prefix size for IpV6 addresses
const PREFIX_MAX_LEN_V6: u8 = 128;
/// Maximum prefix string size for IpV4 addresses
/// len('32') = 2
const PREFIX_STR_MAX_LEN_V4: usize = 2;
/// Maximum prefix string size for IpV6 addresses
/// len('128') = 3
const PREFIX_STR_MAX_LEN_V6: usize = 3;
/// The maximum length of an IpNet in bytes is
/// len('ABCD:EF01:2345:6789:ABCD:EF01:2345:6789/128') = 43
const IP_STR_REP_MAX_LEN: usize = 43;

fn parse_prefix(s: &str, max: u8, max_len: usize) -> Result<u8, String> {
    if s.len() > max_len {
        return Err(format!(
            "error parsing prefix: string length {} is too large",
            s.len()
        ));
    }
    if s.is_empty() || s.chars().any(|c| !c.is_ascii_digit()) {
        return Err(format!("error parsing prefix `{s}`: expected digits"));
    }
    if s.starts_with('0') && s != "0" {
        return Err(format!("error parsing prefix `{s}`: leading zero(s)"));
    }
    let res: u8 = s
        .parse()
        .map_err(|err| format!("error parsing prefix from the string `{s}`: {err}"))?;
    if res > max {
        return Err(format!(
            "error parsing prefix: {res} is larger than the limit {max}"
        ));
    }
    Ok(res)
}

/// Parse an IP address or CIDR range, returning the address and prefix
/// length. IPv4 addresses embedded in IPv6 are rejected.
pub fn parse_ipaddr(s: &str) -> Result<(IpAddr, u8), String> {
    if s.len() > IP_STR_REP_MAX_LEN {
        return Err(format!(
            "error parsing IP address from string `{s}`: string length is too large"
        ));
    }
    if s.matches(':').count() >= 2 && s.matches('.').count() >= 2 {
        return Err(format!(
            "error parsing IP address from string `{s}`: IPv4 embedded in IPv6 is not accepted"
        ));
    }
    let (addr_str, prefix_str) = match s.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (s, None),
    };
    let addr: IpAddr = addr_str
        .parse()
        .map_err(|e| format!("error parsing IP address from the string `{addr_str}`: {e}"))?;
    let prefix = match (addr, prefix_str) {
        (IpAddr::V4(_), None) => PREFIX_MAX_LEN_V4,
        (IpAddr::V6(_), None) => PREFIX_MAX_LEN_V6,
        (IpAddr::V4(_), Some(p)) => parse_prefix(p, PREFIX_MAX_LEN_V4, PREFIX_STR_MAX_LEN_V4)?,
        (IpAddr::V6(_), Some(p)) => parse_prefix(p, PREFIX_MAX_LEN_V6, PREFIX_STR_MAX_LEN_V6)?,
    };
    Ok((addr, prefix))
}

fn check_ip_literal(s: &str) -> Result<(), String> {
    parse_ipaddr(s).map(|_| ())
}

/// Functions of the ipaddr extension
pub fn extension_schema() -> Vec<ExtensionFunctionType> {
    let ipaddr = Type::Extension(ExtensionName::Ipaddr);
    let predicate = |name| ExtensionFunctionType::function(name, vec![ipaddr.clone()], Type::Bool);
    vec![
        ExtensionFunctionType::constructor("ip", ExtensionName::Ipaddr, check_ip_literal),
        predicate("isIpv4"),
        predicate("isIpv6"),
        predicate("isLoopback"),
        predicate("isMulticast"),
        ExtensionFunctionType::function(
            "isInRange",
            vec![ipaddr.clone(), ipaddr.clone()],
            Type::Bool,
        ),
    ]
}
