//! Structural validation of network configurations.
//!
//! Works on raw JSON so that every problem can be reported with the path of
//! the offending field, rather than stopping at the first deserialization
//! error.

use serde_json::{Map, Value};

use super::quantity::parse_integer_value;
use crate::error::ValidationIssue;

/// Hardforks accepted by the local chain.
pub const HARDFORKS: &[&str] = &[
    "chainstart",
    "homestead",
    "dao",
    "tangerineWhistle",
    "spuriousDragon",
    "byzantium",
    "constantinople",
    "petersburg",
    "istanbul",
    "muirGlacier",
    "berlin",
    "london",
    "arrowGlacier",
    "grayGlacier",
    "merge",
    "shanghai",
    "cancun",
    "prague",
];

#[derive(Clone, Copy, Debug)]
enum FieldKind {
    Url,
    Integer,
    PositiveInteger,
    Quantity,
    PositiveNumber,
    Bool,
    Gas,
    ChainType,
    Address,
    Headers,
    Hardfork,
    IntervalMining,
    MempoolOrder,
    GenesisAccounts,
}

const HTTP_FIELDS: &[(&str, FieldKind)] = &[
    ("url", FieldKind::Url),
    ("chainId", FieldKind::Integer),
    ("chainType", FieldKind::ChainType),
    ("from", FieldKind::Address),
    ("timeout", FieldKind::PositiveInteger),
    ("httpHeaders", FieldKind::Headers),
    ("gas", FieldKind::Gas),
    ("gasPrice", FieldKind::Gas),
    ("gasMultiplier", FieldKind::PositiveNumber),
];

const HTTP_REQUIRED: &[&str] = &["url"];

const LOCAL_FIELDS: &[(&str, FieldKind)] = &[
    ("chainId", FieldKind::Integer),
    ("chainType", FieldKind::ChainType),
    ("from", FieldKind::Address),
    ("networkId", FieldKind::Integer),
    ("hardfork", FieldKind::Hardfork),
    ("blockGasLimit", FieldKind::PositiveInteger),
    ("minGasPrice", FieldKind::Quantity),
    ("automine", FieldKind::Bool),
    ("intervalMining", FieldKind::IntervalMining),
    ("mempoolOrder", FieldKind::MempoolOrder),
    ("genesisAccounts", FieldKind::GenesisAccounts),
    ("gas", FieldKind::Gas),
    ("gasPrice", FieldKind::Gas),
    ("gasMultiplier", FieldKind::PositiveNumber),
    ("allowUnlimitedContractSize", FieldKind::Bool),
    ("throwOnTransactionFailures", FieldKind::Bool),
    ("throwOnCallFailures", FieldKind::Bool),
    ("allowBlocksWithSameTimestamp", FieldKind::Bool),
    ("enableTransientStorage", FieldKind::Bool),
    ("enableRip7212", FieldKind::Bool),
];

/// Validate a network configuration object.
///
/// Returns every issue found; an empty list means the value is structurally
/// valid for its transport type.
pub fn validate_network_config(value: &Value) -> Vec<ValidationIssue> {
    let Some(object) = value.as_object() else {
        return vec![ValidationIssue::new(Vec::new(), "Expected an object")];
    };

    let (fields, required) = match object.get("type").and_then(Value::as_str) {
        Some("http") => (HTTP_FIELDS, HTTP_REQUIRED),
        Some("local") => (LOCAL_FIELDS, &[][..]),
        _ => {
            return vec![ValidationIssue::new(
                vec!["type".to_string()],
                "Expected 'http' or 'local'",
            )];
        }
    };

    let mut issues = Vec::new();

    for name in required {
        if !object.contains_key(*name) {
            issues.push(ValidationIssue::new(vec![name.to_string()], "Required"));
        }
    }

    for (key, field_value) in object {
        if key == "type" {
            continue;
        }
        match fields.iter().find(|(name, _)| *name == key.as_str()) {
            Some((_, kind)) => check_field(*kind, vec![key.clone()], field_value, &mut issues),
            None => issues.push(ValidationIssue::new(vec![key.clone()], "Unrecognized key")),
        }
    }

    issues
}

fn check_field(kind: FieldKind, path: Vec<String>, value: &Value, issues: &mut Vec<ValidationIssue>) {
    let message = match kind {
        FieldKind::IntervalMining => return check_interval_mining(path, value, issues),
        FieldKind::Headers => return check_headers(path, value, issues),
        FieldKind::GenesisAccounts => return check_genesis_accounts(path, value, issues),
        FieldKind::Url => {
            let valid = value
                .as_str()
                .and_then(|s| reqwest::Url::parse(s).ok())
                .is_some_and(|url| matches!(url.scheme(), "http" | "https"));
            (!valid).then(|| "Expected an http(s) URL".to_string())
        }
        FieldKind::Integer => value
            .as_u64()
            .is_none()
            .then(|| "Expected a non-negative integer".to_string()),
        FieldKind::PositiveInteger => (!value.as_u64().is_some_and(|n| n > 0))
            .then(|| "Expected a positive integer".to_string()),
        FieldKind::Quantity => (!is_quantity(value))
            .then(|| "Expected a non-negative integer or a 0x-prefixed hex string".to_string()),
        FieldKind::PositiveNumber => (!value.as_f64().is_some_and(|n| n > 0.0 && n.is_finite()))
            .then(|| "Expected a positive number".to_string()),
        FieldKind::Bool => (!value.is_boolean()).then(|| "Expected a boolean".to_string()),
        FieldKind::Gas => (value.as_str() != Some("auto") && !is_quantity(value))
            .then(|| "Expected 'auto' or a non-negative integer".to_string()),
        FieldKind::ChainType => (!matches!(value.as_str(), Some("l1" | "optimism" | "generic")))
            .then(|| "Expected 'l1', 'optimism' or 'generic'".to_string()),
        FieldKind::Address => (!value.as_str().is_some_and(|s| is_hex_of_len(s, 20)))
            .then(|| "Expected a 0x-prefixed 20-byte address".to_string()),
        FieldKind::Hardfork => (!value.as_str().is_some_and(|s| HARDFORKS.contains(&s)))
            .then(|| format!("Expected one of: {}", HARDFORKS.join(", "))),
        FieldKind::MempoolOrder => (!matches!(value.as_str(), Some("fifo" | "priority")))
            .then(|| "Expected 'fifo' or 'priority'".to_string()),
    };

    if let Some(message) = message {
        issues.push(ValidationIssue::new(path, message));
    }
}

fn check_interval_mining(path: Vec<String>, value: &Value, issues: &mut Vec<ValidationIssue>) {
    if value.as_u64().is_some() {
        return;
    }
    let range = value
        .as_array()
        .filter(|items| items.len() == 2)
        .and_then(|items| Some((items[0].as_u64()?, items[1].as_u64()?)));
    match range {
        Some((min, max)) if min <= max => {}
        Some(_) => issues.push(ValidationIssue::new(
            path,
            "The first value of the range must not exceed the second",
        )),
        None => issues.push(ValidationIssue::new(
            path,
            "Expected a non-negative integer or a [min, max] pair",
        )),
    }
}

fn check_headers(path: Vec<String>, value: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(headers) = value.as_object() else {
        issues.push(ValidationIssue::new(
            path,
            "Expected an object mapping header names to strings",
        ));
        return;
    };
    for (name, header_value) in headers {
        if !header_value.is_string() {
            issues.push(ValidationIssue::new(
                child(&path, name.clone()),
                "Expected a string",
            ));
        }
    }
}

fn check_genesis_accounts(path: Vec<String>, value: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(accounts) = value.as_array() else {
        issues.push(ValidationIssue::new(path, "Expected an array of accounts"));
        return;
    };
    for (index, account) in accounts.iter().enumerate() {
        let account_path = child(&path, index.to_string());
        let Some(account) = account.as_object() else {
            issues.push(ValidationIssue::new(account_path, "Expected an object"));
            continue;
        };
        check_genesis_account(&account_path, account, issues);
    }
}

fn check_genesis_account(
    path: &[String],
    account: &Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) {
    match account.get("privateKey").and_then(Value::as_str) {
        Some(key) if is_hex_of_len(key, 32) => {}
        _ => issues.push(ValidationIssue::new(
            child(path, "privateKey".to_string()),
            "Expected a 0x-prefixed 32-byte private key",
        )),
    }
    match account.get("balance") {
        Some(balance) if is_quantity(balance) => {}
        _ => issues.push(ValidationIssue::new(
            child(path, "balance".to_string()),
            "Expected a non-negative integer or a 0x-prefixed hex string",
        )),
    }
    for key in account.keys() {
        if key != "privateKey" && key != "balance" {
            issues.push(ValidationIssue::new(child(path, key.clone()), "Unrecognized key"));
        }
    }
}

fn child(path: &[String], segment: String) -> Vec<String> {
    let mut path = path.to_vec();
    path.push(segment);
    path
}

fn is_quantity(value: &Value) -> bool {
    parse_integer_value(value).is_ok()
}

fn is_hex_of_len(s: &str, bytes: usize) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|digits| digits.len() == bytes * 2 && hex::decode(digits).is_ok())
}
