//! DfE Sign-in Select Organisation Service Library
//!
//! This library provides the core functionality for the select-organisation
//! flow: short-lived selection sessions held in a distributed store, an
//! organisations-API lookup, RSA-signed callbacks to relying applications,
//! and the thin HTTP surface that drives the flow.
//!
//! # Features
//! - Session creation, retrieval and invalidation with passive TTL expiry
//! - Organisation option resolution with filtering and detail levels
//! - RSA-signed callback delivery (PKCS#1 v1.5 or PSS)
//! - Fail-fast YAML/environment configuration
//!
//! # Modules
//! - `session`: the selection session data model
//! - `store`: DynamoDB-backed session persistence
//! - `organisations`: organisation lookup collaborator
//! - `signing`: RSA payload signer
//! - `callback`: signed callback delivery
//! - `service`: the select-organisation use cases
//! - `http`: axum routes and error mapping
//! - `config`: configuration management
//!
//! # Example
//! ```no_run
//! use select_organisation_service::config::Config;
//!
//! let config = Config::new().expect("Failed to load configuration");
//! println!("Serving on port {}", config.select_organisation().server.port);
//! ```
//!
//! # Copyright
//! Copyright (c) 2025 Crown Copyright (Department for Education)
//!
//! # License
//! Licensed under the MIT license.

pub mod callback;
pub mod config;
pub mod http;
pub mod organisations;
pub mod service;
pub mod session;
pub mod signing;
pub mod store;
