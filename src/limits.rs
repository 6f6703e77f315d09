//! Limits and constraints for grammar compilation and validation
//!
//! This module defines limits that keep content-model compilation and
//! document traversal bounded, whatever the shape of the declared grammar
//! or of the validated input.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum element nesting depth of a validated document
    pub max_depth: usize,

    /// Maximum number of children of an `all` group that may be rendered
    /// as a permutation expansion (the expansion has n! branches)
    pub max_all_permutation_particles: usize,

    /// Maximum number of nodes in one content-spec tree
    pub max_content_spec_nodes: usize,

    /// Maximum number of states of one compiled automaton
    pub max_dfa_states: usize,

    /// Maximum numeric occurrence bound expanded into copies of a particle
    pub max_occurs_expansion: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_all_permutation_particles: 8,
            max_content_spec_nodes: 100_000,
            max_dfa_states: 10_000,
            max_occurs_expansion: 1000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_depth: 100,
            max_all_permutation_particles: 5,
            max_content_spec_nodes: 10_000,
            max_dfa_states: 1000,
            max_occurs_expansion: 100,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_depth: 10_000,
            max_all_permutation_particles: 10,
            max_content_spec_nodes: 10_000_000,
            max_dfa_states: 1_000_000,
            max_occurs_expansion: 100_000,
        }
    }

    /// Check if document depth is within limits
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            Err(Error::LimitExceeded(format!(
                "element depth {} exceeds maximum {}",
                depth, self.max_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an `all` group is small enough to render as permutations
    pub fn check_all_permutation(&self, particles: usize) -> Result<()> {
        if particles > self.max_all_permutation_particles {
            Err(Error::LimitExceeded(format!(
                "all group with {} particles exceeds permutation maximum {}",
                particles, self.max_all_permutation_particles
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a content-spec tree is within limits
    pub fn check_content_spec_nodes(&self, count: usize) -> Result<()> {
        if count > self.max_content_spec_nodes {
            Err(Error::LimitExceeded(format!(
                "content spec with {} nodes exceeds maximum {}",
                count, self.max_content_spec_nodes
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an automaton is within limits
    pub fn check_dfa_states(&self, count: usize) -> Result<()> {
        if count > self.max_dfa_states {
            Err(Error::LimitExceeded(format!(
                "content model automaton with {} states exceeds maximum {}",
                count, self.max_dfa_states
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an occurrence bound can be expanded
    pub fn check_occurs_expansion(&self, bound: u32) -> Result<()> {
        if bound > self.max_occurs_expansion {
            Err(Error::LimitExceeded(format!(
                "occurrence bound {} exceeds maximum {}",
                bound, self.max_occurs_expansion
            )))
        } else {
            Ok(())
        }
    }
}
