// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped authorization for Loom endpoints.
//!
//! This crate provides:
//! - [`Authorizer`] - runs the decision pipeline for one request
//! - [`EndpointPolicy`] - action, subject type and resolvers of an endpoint
//! - [`PermissionRegistry`] - globally registered permission sources
//! - [`SubjectResolver`] / [`ResolvedSubjects`] - run-once instance loading
//! - [`Able`] - capability handle for finer checks inside endpoints
//! - [`AclConfig`] - layered configuration
//!
//! # Example
//!
//! ```ignore
//! let authorizer = Authorizer::new(load_config()?, registry).with_services(services);
//! let policy = EndpointPolicy::new("update", "Todo").with_resolver("todo", todo_resolver);
//!
//! let auth = authorizer.authorize(Arc::new(request_ctx), &policy).await?;
//! auth.ensure_allowed()?;
//! let todo = auth.subject().await?.ok_or(NotFound)?;
//! ```

pub mod able;
pub mod authorizer;
pub mod config;
pub mod context;
pub mod error;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod services;
pub mod sql;

pub use able::{AbilityAble, Able, SuperuserAble};
pub use authorizer::{Authorization, Authorizer, Decision, DecisionBasis};
pub use config::{load_config, load_config_with_file, AclConfig, AclConfigLayer};
pub use context::{AuthContext, RequestContext};
pub use error::{AclError, ConfigError, ResolveError};
pub use policy::EndpointPolicy;
pub use registry::PermissionRegistry;
pub use resolver::{
	ActorResolver, ExtensionActorResolver, ResolveSubject, ResolvedSubjects, SubjectResolver,
	PRIMARY_SUBJECT,
};
pub use services::ServiceRegistry;
pub use sql::{bind_sql_params, bind_sql_params_as};
