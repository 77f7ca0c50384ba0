//! Shared test utilities for domain testing
//!
//! This crate provides reusable test infrastructure for all domain crates:
//! - `TestCouchDb`: CouchDB container with automatic cleanup (feature: "couchdb")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Features
//!
//! - `couchdb`: Enables CouchDB test infrastructure
//! - `all`: Enables all database test infrastructure
//!
//! # Usage
//!
//! Add `features = ["couchdb"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["couchdb"] }
//! ```
//!
//! Then in your tests:
//!
//! ```rust,ignore
//! use test_utils::{TestCouchDb, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_couchdb_test() {
//!     let couch = TestCouchDb::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let db = couch.database(&builder.database_name()).await;
//!     let product_name = builder.name("product", "main");
//! }
//! ```

#[cfg(feature = "couchdb")]
mod couchdb;

#[cfg(feature = "couchdb")]
pub use couchdb::TestCouchDb;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_create_product");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique name for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.name("product", "main"), "test-product-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Generate a document id unique to this test
    pub fn id(&self, suffix: &str) -> String {
        format!("{:016x}-{}", self.seed, suffix)
    }

    /// Database name unique to this test.
    ///
    /// CouchDB names must start with a lowercase letter.
    pub fn database_name(&self) -> String {
        format!("test_{:016x}", self.seed)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Numeric generation of a `N-hash` revision token
    pub fn rev_generation(rev: &str) -> u64 {
        rev.split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or_else(|| panic!("malformed revision token: {}", rev))
    }

    /// Assert that `after` is a later revision than `before`
    pub fn assert_rev_advanced(before: &str, after: &str, context: &str) {
        assert_ne!(before, after, "{}: revision did not change", context);
        assert!(
            rev_generation(after) > rev_generation(before),
            "{}: expected revision after {}, got {}",
            context,
            before,
            after
        );
    }
}
