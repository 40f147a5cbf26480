//! Prompt catalog: types, cache, network client, loader and the authenticated
//! library download.

pub mod cache;
pub mod client;
pub mod embedded;
pub mod error;
pub mod library;
pub mod loader;
pub mod local;
pub mod types;

pub use {
    error::{Error, Result},
    library::{Authorizer, EnvAuthorizer, LibraryReport, LibrarySync, StaticAuthorizer},
    loader::{BackgroundRefresh, RefreshSummary, RegistryLoadResult, RegistryLoader, RegistryStatus},
    types::{
        Bundle, CacheMeta, Prompt, PromptFilter, PromptVariable, Registry, RegistrySource,
        VariableType,
    },
};
