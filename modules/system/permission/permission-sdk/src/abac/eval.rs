//! Three-valued evaluation of parsed expressions.
//!
//! A comparison that reads a missing (or `null`) attribute is `Unknown`, and
//! `Unknown` survives negation. Only a definite `True` at the top grants.

use std::cmp::Ordering;

use serde_json::Value;

use super::parser::{CmpOp, Expr, Literal, Operand, Path, Root, Set};
use crate::models::AttributeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    fn from_bool(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }

    fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }

    fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }
}

/// The three attribute maps an expression reads from.
pub(crate) struct Attributes<'a> {
    pub user: &'a AttributeMap,
    pub resource: &'a AttributeMap,
    pub context: &'a AttributeMap,
}

/// Comparable view of an operand value.
#[derive(Debug, Clone, Copy)]
enum Scalar<'a> {
    Str(&'a str),
    Num(f64),
    Bool(bool),
    /// Arrays and objects: present, but never equal to a scalar.
    Composite,
}

impl<'a> Scalar<'a> {
    fn from_json(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Str(s)),
            Value::Number(n) => n.as_f64().map(Self::Num),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Array(_) | Value::Object(_) => Some(Self::Composite),
        }
    }

    fn from_literal(literal: &'a Literal) -> Self {
        match literal {
            Literal::Str(s) => Self::Str(s),
            Literal::Num(n) => Self::Num(*n),
            Literal::Bool(b) => Self::Bool(*b),
        }
    }

    /// `None` when the two values are of different types.
    #[allow(clippy::float_cmp)]
    fn same_type_eq(self, other: Self) -> Option<bool> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a == b),
            (Self::Num(a), Self::Num(b)) => Some(a == b),
            (Self::Bool(a), Self::Bool(b)) => Some(a == b),
            _ => None,
        }
    }

    fn ordering(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Num(a), Self::Num(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

impl Attributes<'_> {
    fn resolve(&self, path: &Path) -> Option<&Value> {
        let map = match path.root {
            Root::User => self.user,
            Root::Resource => self.resource,
            Root::Context => self.context,
        };
        let (first, rest) = path.segments.split_first()?;
        let mut value = map.get(first)?;
        for key in rest {
            value = value.get(key.as_str())?;
        }
        Some(value)
    }

    fn scalar<'s>(&'s self, operand: &'s Operand) -> Option<Scalar<'s>> {
        match operand {
            Operand::Path(path) => self.resolve(path).and_then(Scalar::from_json),
            Operand::Literal(literal) => Some(Scalar::from_literal(literal)),
        }
    }
}

pub(crate) fn evaluate(expr: &Expr, attrs: &Attributes<'_>) -> Truth {
    match expr {
        Expr::Bool(b) => Truth::from_bool(*b),
        Expr::Flag(path) => match attrs.resolve(path) {
            Some(Value::Bool(b)) => Truth::from_bool(*b),
            _ => Truth::Unknown,
        },
        Expr::Compare { left, op, right } => {
            let (Some(l), Some(r)) = (attrs.scalar(left), attrs.scalar(right)) else {
                return Truth::Unknown;
            };
            compare(l, *op, r)
        }
        Expr::In { operand, set } => {
            let Some(value) = attrs.scalar(operand) else {
                return Truth::Unknown;
            };
            contains(set, value)
        }
        Expr::Not(inner) => evaluate(inner, attrs).not(),
        Expr::And(l, r) => evaluate(l, attrs).and(evaluate(r, attrs)),
        Expr::Or(l, r) => evaluate(l, attrs).or(evaluate(r, attrs)),
    }
}

fn compare(left: Scalar<'_>, op: CmpOp, right: Scalar<'_>) -> Truth {
    match op {
        CmpOp::Eq => Truth::from_bool(left.same_type_eq(right).unwrap_or(false)),
        CmpOp::Ne => Truth::from_bool(!left.same_type_eq(right).unwrap_or(false)),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let Some(ordering) = left.ordering(right) else {
                return Truth::Unknown;
            };
            Truth::from_bool(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

fn contains(set: &Set, value: Scalar<'_>) -> Truth {
    match set {
        Set::Range(lo, hi) => match value {
            Scalar::Num(n) => Truth::from_bool(*lo <= n && n <= *hi),
            _ => Truth::Unknown,
        },
        Set::Values(items) => Truth::from_bool(items.iter().any(|item| {
            Scalar::from_literal(item)
                .same_type_eq(value)
                .unwrap_or(false)
        })),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::abac::parser::parse;

    fn map(value: Value) -> AttributeMap {
        serde_json::from_value(value).unwrap()
    }

    fn truth(src: &str, user: &AttributeMap, resource: &AttributeMap) -> Truth {
        let context = map(json!({ "hour": 10, "region": "eu" }));
        let attrs = Attributes {
            user,
            resource,
            context: &context,
        };
        evaluate(&parse(src).unwrap(), &attrs)
    }

    #[test]
    fn kleene_connectives() {
        use Truth::{False, True, Unknown};
        assert_eq!(Unknown.not(), Unknown);
        assert_eq!(Unknown.and(False), False);
        assert_eq!(Unknown.and(True), Unknown);
        assert_eq!(Unknown.or(True), True);
        assert_eq!(Unknown.or(False), Unknown);
    }

    #[test]
    fn missing_attribute_is_unknown_even_when_negated() {
        let user = map(json!({ "department": "eng" }));
        let resource = map(json!({}));

        assert_eq!(
            truth("user.department == resource.department", &user, &resource),
            Truth::Unknown
        );
        assert_eq!(
            truth("!(user.department == resource.department)", &user, &resource),
            Truth::Unknown
        );
        assert_eq!(
            truth("user.department != resource.department", &user, &resource),
            Truth::Unknown
        );
        assert_eq!(
            truth("resource.owner not in ['a', 'b']", &user, &resource),
            Truth::Unknown
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let user = map(json!({ "department": null }));
        let resource = map(json!({ "department": null }));
        assert_eq!(
            truth("user.department == resource.department", &user, &resource),
            Truth::Unknown
        );
    }

    #[test]
    fn mismatched_types() {
        let user = map(json!({ "level": 3, "name": "3" }));
        let empty = map(json!({}));

        assert_eq!(truth("user.level == '3'", &user, &empty), Truth::False);
        assert_eq!(truth("user.level != '3'", &user, &empty), Truth::True);
        assert_eq!(truth("user.name < 5", &user, &empty), Truth::Unknown);
    }

    #[test]
    fn numeric_and_lexicographic_ordering() {
        let user = map(json!({ "level": 3.0, "name": "bob" }));
        let empty = map(json!({}));

        assert_eq!(truth("user.level >= 3", &user, &empty), Truth::True);
        assert_eq!(truth("user.level < 3", &user, &empty), Truth::False);
        assert_eq!(truth("user.level == 3", &user, &empty), Truth::True);
        assert_eq!(truth("user.name > 'alice'", &user, &empty), Truth::True);
        assert_eq!(truth("user.name <= 'al'", &user, &empty), Truth::False);
    }

    #[test]
    fn range_is_inclusive() {
        let empty = map(json!({}));
        for (hour, expected) in [(8, Truth::False), (9, Truth::True), (18, Truth::True), (19, Truth::False)] {
            let user = map(json!({ "hour": hour }));
            assert_eq!(truth("user.hour in [9, 18]", &user, &empty), expected, "{hour}");
        }
        let text = map(json!({ "hour": "10" }));
        assert_eq!(truth("user.hour in [9, 18]", &text, &empty), Truth::Unknown);
    }

    #[test]
    fn membership_list() {
        let empty = map(json!({}));
        let user = map(json!({ "region": "eu" }));

        assert_eq!(truth("user.region in ['us', 'eu']", &user, &empty), Truth::True);
        assert_eq!(truth("user.region in ['us']", &user, &empty), Truth::False);
        assert_eq!(truth("user.region in []", &user, &empty), Truth::False);
        assert_eq!(truth("user.region not in ['us']", &user, &empty), Truth::True);
    }

    #[test]
    fn nested_paths_and_flags() {
        let user = map(json!({ "profile": { "active": true, "team": "core" }, "tags": ["a"] }));
        let empty = map(json!({}));

        assert_eq!(truth("user.profile.active", &user, &empty), Truth::True);
        assert_eq!(truth("user.profile.team == 'core'", &user, &empty), Truth::True);
        assert_eq!(truth("user.profile.missing", &user, &empty), Truth::Unknown);
        assert_eq!(truth("user.tags == 'a'", &user, &empty), Truth::False);
    }

    #[test]
    fn context_map_is_readable() {
        let empty = map(json!({}));
        assert_eq!(
            truth("context.hour in [9, 18] && context['region'] == 'eu'", &empty, &empty),
            Truth::True
        );
    }
}
