//! Error types.
//!
//! Neither error crosses the public boundary of the cache as a failure of a
//! whole operation: a rejected descriptor is logged and skipped, a refused
//! dependency fails the one resource that declared it.

use thiserror::Error;

use crate::resource::LoadState;

/// Why a resource definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("resource definition must be a JSON object")]
    NotAnObject,
    #[error("'Name' key is missing")]
    MissingName,
    #[error("'Name' key must be a string")]
    NameNotString,
    #[error("resource name is empty")]
    EmptyName,
    #[error("resource name '{0}' starts with '+', which is reserved by the engine")]
    ReservedName(String),
    #[error("unknown source type '{0}'")]
    UnknownSource(String),
    #[error("'Data' key is missing")]
    MissingData,
    #[error("'Data' of a {source_type} resource must be {expected}")]
    InvalidData {
        source_type: &'static str,
        expected: &'static str,
    },
    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),
}

/// Why a dependency edge was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("resource '{resource}' is {state}, dependencies can only be added while loading")]
    NotLoading { resource: String, state: LoadState },
    #[error("resource '{resource}' cannot depend on itself")]
    SelfDependency { resource: String },
    #[error("making '{resource}' depend on '{dependency}' would create a cycle")]
    Cycle { resource: String, dependency: String },
}
