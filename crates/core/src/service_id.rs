// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service identifiers.
//!
//! A service id is `{service_type}.{variant}` where the variant is always the
//! last dot-separated segment. The service type itself may contain dots
//! (e.g. `examples.minimal`), so parsing splits on the *last* dot and
//! variants must be dotless.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Variant used when a declaration does not name one.
pub const DEFAULT_VARIANT: &str = "dev";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceIdError {
    #[error("variant '{0}' must not contain dots")]
    DottedVariant(String),
    #[error("service id '{0}' must contain at least one dot ({{service_type}}.{{variant}})")]
    MissingVariant(String),
    #[error("service type must not be empty")]
    EmptyServiceType,
    #[error("variant must not be empty")]
    EmptyVariant,
}

/// Identity of one service instance within a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId {
    service_type: String,
    variant: String,
}

impl ServiceId {
    pub fn new(
        service_type: impl Into<String>,
        variant: impl Into<String>,
    ) -> Result<Self, ServiceIdError> {
        let service_type = service_type.into();
        let variant = variant.into();
        if service_type.is_empty() {
            return Err(ServiceIdError::EmptyServiceType);
        }
        if variant.is_empty() {
            return Err(ServiceIdError::EmptyVariant);
        }
        if variant.contains('.') {
            return Err(ServiceIdError::DottedVariant(variant));
        }
        Ok(Self { service_type, variant })
    }

    /// Parse `{service_type}.{variant}`, splitting on the last dot.
    pub fn parse(id: &str) -> Result<Self, ServiceIdError> {
        match id.rsplit_once('.') {
            Some((service_type, variant)) => Self::new(service_type, variant),
            None => Err(ServiceIdError::MissingVariant(id.to_string())),
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.service_type, self.variant)
    }
}

impl TryFrom<String> for ServiceId {
    type Error = ServiceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> String {
        id.to_string()
    }
}

#[cfg(test)]
#[path = "service_id_tests.rs"]
mod tests;
