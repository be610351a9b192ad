use std::collections::HashMap;
use std::fmt;

/// A scalar value a row restriction compares against.
///
/// Identifiers in this engine are opaque strings (`"u1"`, `"d1"`), so
/// there is no dedicated UUID variant; UUID-keyed stores bind the string form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeValue {
    /// String value (user IDs, department IDs, tenant IDs, ...)
    String(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
}

impl ScopeValue {
    /// Convert an attribute value into a scope value.
    ///
    /// Returns `None` for JSON values that cannot be bound as a scalar
    /// (null, arrays, objects, non-integer numbers).
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for ScopeValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ScopeValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for ScopeValue {
    #[inline]
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for ScopeValue {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Well-known row property names.
///
/// Shared by the built-in scope handlers and the query layers that map
/// them onto columns.
pub mod scope_properties {
    /// Owning user of a row. Typically maps to an `owner_id` column.
    pub const OWNER_ID: &str = "owner_id";

    /// Department/group of a row. Typically maps to a `dept_id` column.
    pub const DEPT_ID: &str = "dept_id";

    /// Owning tenant of a row. Typically maps to a `tenant_id` column.
    pub const TENANT_ID: &str = "tenant_id";
}

/// A single scope filter: a typed predicate on a named row property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Equality: `property = value`.
    Eq {
        property: String,
        value: ScopeValue,
    },
    /// Set membership: `property IN (values)`.
    In {
        property: String,
        values: Vec<ScopeValue>,
    },
}

impl ScopeFilter {
    /// Create an equality filter (`property = value`).
    #[must_use]
    pub fn eq(property: impl Into<String>, value: impl Into<ScopeValue>) -> Self {
        Self::Eq {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Create a set membership filter from convertible values.
    #[must_use]
    pub fn r#in<V: Into<ScopeValue>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The row property this filter reads.
    #[must_use]
    pub fn property(&self) -> &str {
        match self {
            Self::Eq { property, .. } | Self::In { property, .. } => property,
        }
    }

    /// Returns `true` if `value` satisfies the filter.
    #[must_use]
    pub fn accepts(&self, value: &ScopeValue) -> bool {
        match self {
            Self::Eq { value: expected, .. } => expected == value,
            Self::In { values, .. } => values.contains(value),
        }
    }
}

/// Read access to the properties of one row, for in-memory evaluation of
/// an [`AccessScope`].
pub trait ScopeRow {
    /// The value of `property`, or `None` if the row does not carry it.
    fn property(&self, property: &str) -> Option<ScopeValue>;
}

impl ScopeRow for HashMap<String, ScopeValue> {
    fn property(&self, property: &str) -> Option<ScopeValue> {
        self.get(property).cloned()
    }
}

impl ScopeRow for HashMap<&str, ScopeValue> {
    fn property(&self, property: &str) -> Option<ScopeValue> {
        self.get(property).cloned()
    }
}

/// A conjunction (AND) of scope filters: one access path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeConstraint {
    filters: Vec<ScopeFilter>,
}

impl ScopeConstraint {
    #[must_use]
    pub fn new(filters: Vec<ScopeFilter>) -> Self {
        Self { filters }
    }

    /// The filters in this constraint (AND-ed together).
    #[inline]
    #[must_use]
    pub fn filters(&self) -> &[ScopeFilter] {
        &self.filters
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// A row satisfies the constraint when it carries every filtered
    /// property with an accepted value. A missing property fails the filter.
    #[must_use]
    pub fn matches<R: ScopeRow + ?Sized>(&self, row: &R) -> bool {
        self.filters.iter().all(|f| {
            row.property(f.property())
                .is_some_and(|value| f.accepts(&value))
        })
    }
}

/// A row restriction handed to the query layer.
///
/// A disjunction (OR) of [`ScopeConstraint`]s. Two distinguished values
/// exist: [`AccessScope::allow_all`] (tautology, no row filtering) and
/// [`AccessScope::deny_all`] (matches nothing). The default is deny-all.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use permkit_security::access_scope::{AccessScope, ScopeValue, scope_properties};
///
/// let scope = AccessScope::for_property(scope_properties::OWNER_ID, "u1");
///
/// let mut row = HashMap::new();
/// row.insert(scope_properties::OWNER_ID, ScopeValue::from("u1"));
/// assert!(scope.matches(&row));
///
/// assert!(!AccessScope::deny_all().matches(&row));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessScope {
    constraints: Vec<ScopeConstraint>,
    unconstrained: bool,
}

impl Default for AccessScope {
    /// Default is deny-all: no constraints and not unconstrained.
    fn default() -> Self {
        Self::deny_all()
    }
}

impl AccessScope {
    // ── Constructors ────────────────────────────────────────────────

    /// Create an access scope from a list of constraints (OR-ed).
    #[must_use]
    pub fn from_constraints(constraints: Vec<ScopeConstraint>) -> Self {
        Self {
            constraints,
            unconstrained: false,
        }
    }

    #[must_use]
    pub fn single(constraint: ScopeConstraint) -> Self {
        Self::from_constraints(vec![constraint])
    }

    /// The tautology: every row matches.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            constraints: Vec::new(),
            unconstrained: true,
        }
    }

    /// No row matches.
    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            constraints: Vec::new(),
            unconstrained: false,
        }
    }

    /// Create a scope with a single `property = value` filter.
    #[must_use]
    pub fn for_property(property: impl Into<String>, value: impl Into<ScopeValue>) -> Self {
        Self::single(ScopeConstraint::new(vec![ScopeFilter::eq(property, value)]))
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The constraints in this scope (OR-ed).
    #[inline]
    #[must_use]
    pub fn constraints(&self) -> &[ScopeConstraint] {
        &self.constraints
    }

    #[inline]
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.unconstrained
    }

    /// A scope is deny-all when it is not unconstrained and has no constraints.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        !self.unconstrained && self.constraints.is_empty()
    }

    /// Collect all values for a given property across all constraints.
    #[must_use]
    pub fn all_values_for(&self, property: &str) -> Vec<&ScopeValue> {
        let mut result = Vec::new();
        for constraint in &self.constraints {
            for filter in constraint.filters() {
                match filter {
                    ScopeFilter::Eq { property: p, value } if p == property => {
                        result.push(value);
                    }
                    ScopeFilter::In { property: p, values } if p == property => {
                        result.extend(values);
                    }
                    ScopeFilter::Eq { .. } | ScopeFilter::In { .. } => {}
                }
            }
        }
        result
    }

    /// Check if any constraint references the given property.
    #[must_use]
    pub fn has_property(&self, property: &str) -> bool {
        self.constraints
            .iter()
            .any(|c| c.filters().iter().any(|f| f.property() == property))
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Evaluate the restriction against one row.
    #[must_use]
    pub fn matches<R: ScopeRow + ?Sized>(&self, row: &R) -> bool {
        if self.unconstrained {
            return true;
        }
        self.constraints.iter().any(|c| c.matches(row))
    }

    /// Narrow the scope with an additional filter AND-ed into every access
    /// path. Allow-all becomes a single constraint; deny-all stays deny-all.
    #[must_use]
    pub fn and_filter(self, filter: ScopeFilter) -> Self {
        if self.unconstrained {
            return Self::single(ScopeConstraint::new(vec![filter]));
        }
        let constraints = self
            .constraints
            .into_iter()
            .map(|mut c| {
                c.filters.push(filter.clone());
                c
            })
            .collect();
        Self::from_constraints(constraints)
    }
}
