//! Validation sessions
//!
//! A [`ValidationSession`] ties a shared [`GrammarPool`] to a set of
//! [`ValidationOptions`]: it resolves grammars through the pool before a
//! document is parsed and hands out a [`DocumentValidator`] per grammar.

use std::sync::Arc;

use crate::error::Result;
use crate::pool::GrammarPool;
use crate::validators::{DocumentValidator, Grammar, GrammarDescription, ValidationOptions};

/// Pool-backed factory of document validators
#[derive(Debug, Clone)]
pub struct ValidationSession {
    pool: Arc<GrammarPool>,
    options: ValidationOptions,
}

impl ValidationSession {
    /// Create a session with default options
    pub fn new(pool: Arc<GrammarPool>) -> Self {
        Self {
            pool,
            options: ValidationOptions::default(),
        }
    }

    /// Set the validation options
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Shared grammar pool
    pub fn pool(&self) -> &Arc<GrammarPool> {
        &self.pool
    }

    /// Options used for new validators
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Find the grammar for a description in the pool, or compile it with
    /// `compile` and cache the result.
    pub fn resolve<F>(&self, description: &GrammarDescription, compile: F) -> Result<Arc<Grammar>>
    where
        F: FnOnce() -> Result<Grammar>,
    {
        self.pool.get_or_compile(description, compile)
    }

    /// Create a validator for one grammar
    pub fn validator<'g>(&self, grammar: &'g Grammar) -> DocumentValidator<'g> {
        tracing::debug!(grammar = %grammar.description(), "new validator");
        DocumentValidator::with_options(grammar, self.options.clone())
    }
}
