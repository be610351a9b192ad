//! Attribute-based policy evaluation.
//!
//! Policies are small boolean expressions over three attribute maps:
//!
//! ```text
//! user.department == resource.department && context.hour in [9, 18]
//! userAttrs["region"] in ['eu', 'us'] || NOT resource.archived
//! ```
//!
//! - roots: `user`/`userAttrs`, `resource`/`resourceAttrs`, `context`/`contextAttrs`
//! - access: `.key`, `["key"]`, nested through JSON objects
//! - comparisons: `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - membership: `in [a, b, c]`, `not in [...]`; exactly two numbers `[lo, hi]`
//!   form an inclusive range
//! - connectives: `&&`/`AND`, `||`/`OR`, `!`/`NOT`, parentheses
//!
//! Missing attributes make the containing comparison unknown, and an unknown
//! result never grants.

mod eval;
mod lexer;
mod parser;

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ConfigurationError;
use crate::models::AttributeMap;

use eval::{Attributes, Truth};

/// Expression behind [`AbacEvaluator::department_match`].
pub const DEPARTMENT_MATCH: &str = "user.department == resource.department";

/// A compiled policy expression.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: parser::Expr,
}

impl Expression {
    /// Compile `source`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidExpression`] with the byte offset of the
    /// first syntax problem.
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            source: source.to_owned(),
            root: parser::parse(source)?,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `true` only when the expression definitely holds.
    #[must_use]
    pub fn evaluate(
        &self,
        user: &AttributeMap,
        resource: &AttributeMap,
        context: &AttributeMap,
    ) -> bool {
        let attrs = Attributes {
            user,
            resource,
            context,
        };
        eval::evaluate(&self.root, &attrs) == Truth::True
    }
}

/// Evaluates policy expressions, caching each compiled form by source text.
#[derive(Debug, Default)]
pub struct AbacEvaluator {
    compiled: DashMap<String, Arc<Expression>>,
}

impl AbacEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `expression`, reusing an earlier compilation when available.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidExpression`] for malformed input.
    pub fn compile(&self, expression: &str) -> Result<Arc<Expression>, ConfigurationError> {
        if let Some(hit) = self.compiled.get(expression) {
            return Ok(Arc::clone(hit.value()));
        }
        let compiled = Arc::new(Expression::parse(expression)?);
        self.compiled
            .insert(expression.to_owned(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Evaluate `expression` against the given attribute maps.
    ///
    /// An absent user or resource map denies without looking at the
    /// expression. An absent context map reads as empty.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidExpression`] for malformed input.
    pub fn evaluate(
        &self,
        expression: &str,
        user: Option<&AttributeMap>,
        resource: Option<&AttributeMap>,
        context: Option<&AttributeMap>,
    ) -> Result<bool, ConfigurationError> {
        let (Some(user), Some(resource)) = (user, resource) else {
            tracing::warn!(
                user_attributes = user.is_some(),
                resource_attributes = resource.is_some(),
                "attribute map absent, abac check denied"
            );
            return Ok(false);
        };

        let compiled = self.compile(expression).inspect_err(|e| {
            tracing::error!(error = %e, "policy expression failed to compile");
        })?;

        let empty = AttributeMap::new();
        let granted = compiled.evaluate(user, resource, context.unwrap_or(&empty));
        tracing::debug!(granted, "abac decision");
        Ok(granted)
    }

    /// `user.department == resource.department`.
    #[must_use]
    pub fn department_match(
        &self,
        user: Option<&AttributeMap>,
        resource: Option<&AttributeMap>,
    ) -> bool {
        matches!(self.evaluate(DEPARTMENT_MATCH, user, resource, None), Ok(true))
    }

    /// Number of distinct expressions compiled so far.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.compiled.len()
    }
}
