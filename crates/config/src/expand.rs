// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable expansion over parsed configuration trees.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

// Regex pattern for ${VAR:-default} expansion
#[allow(clippy::expect_used)]
static ENV_DEFAULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+):-([^}]*)\}").expect("constant regex pattern is valid"));

// Regex pattern for plain ${VAR} expansion
#[allow(clippy::expect_used)]
static ENV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").expect("constant regex pattern is valid"));

fn expand_str(input: &str) -> String {
    let result = ENV_DEFAULT_PATTERN.replace_all(input, |caps: &regex::Captures| {
        let name = &caps[1];
        let default_value = &caps[2];
        std::env::var(name).unwrap_or_else(|_| default_value.to_string())
    });
    ENV_PATTERN
        .replace_all(&result, |caps: &regex::Captures| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_else(|_| {
                tracing::debug!(var = name, "undefined environment variable expands to empty");
                String::new()
            })
        })
        .to_string()
}

/// True when the string is exactly one placeholder, nothing else.
fn is_single_placeholder(input: &str) -> bool {
    let full = |re: &Regex| re.find(input).is_some_and(|m| m.start() == 0 && m.end() == input.len());
    full(&ENV_DEFAULT_PATTERN) || full(&ENV_PATTERN)
}

/// Expand `${VAR}` and `${VAR:-default}` in every string scalar, recursively.
///
/// A string that consists of a single placeholder and expands to an integer
/// is converted to a number, so values like a bus port keep their type.
pub fn expand_env(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let expanded = expand_str(&s);
            if is_single_placeholder(&s) {
                if let Ok(n) = expanded.parse::<i64>() {
                    return Value::from(n);
                }
            }
            Value::String(expanded)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(expand_env).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, expand_env(v))).collect())
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "expand_tests.rs"]
mod tests;
