// Copyright 2026 Pricescout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pricescout runtime library: the concurrent scrape dispatcher, its
//! extraction backends and the HTTP service around them.
//!
//! This library crate exposes the core modules for integration testing.

pub mod backend;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod lease;
pub mod rest;
pub mod tracker;
