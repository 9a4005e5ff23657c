//! Boolean conditions for WHERE / HAVING / ON clauses.

use crate::error::{BuddyError, BuddyResult};
use crate::expr::{Expr, QueryPart};
use crate::value::Value;
use std::ops::{Add, Not};

/// Predicate node. Combination never mutates an operand; `and`, `or`, `!`
/// and `+` all build new nodes.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `left op right`
    Binary {
        left: Expr,
        op: &'static str,
        right: Expr,
    },
    /// `expr op`, e.g. `x is null`
    Unary { expr: Expr, op: &'static str },
    /// `expr in (...)` / `expr not in (...)`
    In {
        expr: Expr,
        values: Vec<Expr>,
        negated: bool,
    },
    /// `expr BETWEEN lower AND upper`
    Between { expr: Expr, lower: Expr, upper: Expr },
    /// Conjunction, at least one operand
    And(Vec<Predicate>),
    /// Disjunction, at least one operand; parenthesized when it has several
    Or(Vec<Predicate>),
    /// `not (p)`
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn binary(left: Expr, op: &'static str, right: Expr) -> Self {
        Predicate::Binary { left, op, right }
    }

    pub fn unary(expr: Expr, op: &'static str) -> Self {
        Predicate::Unary { expr, op }
    }

    /// AND over every predicate. Fails when `predicates` is empty.
    pub fn all(predicates: Vec<Predicate>) -> BuddyResult<Self> {
        if predicates.is_empty() {
            return Err(BuddyError::builder("And requires at least one condition"));
        }
        Ok(Predicate::And(predicates))
    }

    /// OR over every predicate. Fails when `predicates` is empty.
    pub fn any(predicates: Vec<Predicate>) -> BuddyResult<Self> {
        if predicates.is_empty() {
            return Err(BuddyError::builder("Or requires at least one condition"));
        }
        Ok(Predicate::Or(predicates))
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(vec![self, other])
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(vec![self, other])
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

fn write_joined(out: &mut String, parts: &[Predicate], sep: &str, qualified: bool) {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        part.write_sql(out, qualified);
    }
}

impl QueryPart for Predicate {
    fn write_sql(&self, out: &mut String, qualified: bool) {
        match self {
            Predicate::Binary { left, op, right } => {
                left.write_sql(out, qualified);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                right.write_sql(out, qualified);
            }
            Predicate::Unary { expr, op } => {
                expr.write_sql(out, qualified);
                out.push(' ');
                out.push_str(op);
            }
            // An empty list can never match; render a constant instead of `in ()`.
            Predicate::In {
                values, negated, ..
            } if values.is_empty() => {
                out.push_str(if *negated { "1=1" } else { "1=0" });
            }
            Predicate::In {
                expr,
                values,
                negated,
            } => {
                expr.write_sql(out, qualified);
                out.push_str(if *negated { " not in (" } else { " in (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    value.write_sql(out, qualified);
                }
                out.push(')');
            }
            Predicate::Between { expr, lower, upper } => {
                expr.write_sql(out, qualified);
                out.push_str(" BETWEEN ");
                lower.write_sql(out, qualified);
                out.push_str(" AND ");
                upper.write_sql(out, qualified);
            }
            Predicate::And(parts) => write_joined(out, parts, " and ", qualified),
            Predicate::Or(parts) if parts.len() == 1 => parts[0].write_sql(out, qualified),
            Predicate::Or(parts) => {
                out.push('(');
                write_joined(out, parts, " or ", qualified);
                out.push(')');
            }
            Predicate::Not(inner) => {
                out.push_str("not (");
                inner.write_sql(out, qualified);
                out.push(')');
            }
        }
    }

    fn collect_values(&self, out: &mut Vec<Value>) {
        match self {
            Predicate::Binary { left, right, .. } => {
                left.collect_values(out);
                right.collect_values(out);
            }
            Predicate::Unary { expr, .. } => expr.collect_values(out),
            Predicate::In { values, .. } if values.is_empty() => {}
            Predicate::In { expr, values, .. } => {
                expr.collect_values(out);
                for value in values {
                    value.collect_values(out);
                }
            }
            Predicate::Between { expr, lower, upper } => {
                expr.collect_values(out);
                lower.collect_values(out);
                upper.collect_values(out);
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    part.collect_values(out);
                }
            }
            Predicate::Not(inner) => inner.collect_values(out),
        }
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

/// `p + q` is `p and q`.
impl Add for Predicate {
    type Output = Predicate;

    fn add(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ColumnRef, Expression, IntoExpr};

    fn col(name: &str) -> Expr {
        Expr::Column(ColumnRef::new("t1", name))
    }

    #[test]
    fn binary_operators() {
        assert_eq!(col("a").eq(1i32).to_qualified_sql(), "t1.a = ?");
        assert_eq!(col("a").not_equal(1i32).to_qualified_sql(), "t1.a <> ?");
        assert_eq!(col("a").less_or_equal(col("b")).to_qualified_sql(), "t1.a <= t1.b");
        assert_eq!(col("a").like("x%").to_qualified_sql(), "t1.a like ?");
    }

    #[test]
    fn ilike_lowers_both_sides() {
        let p = col("name").ilike("AN%");
        assert_eq!(p.to_qualified_sql(), "lower(t1.name) like lower(?)");
        assert_eq!(p.values(), vec![Value::from("AN%")]);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(col("a").is_null().to_qualified_sql(), "t1.a is null");
        assert_eq!(col("a").is_not_null().to_qualified_sql(), "t1.a is not null");
        assert_eq!(col("ok").is_true().to_qualified_sql(), "t1.ok is true");
        assert_eq!(col("ok").is_false().to_qualified_sql(), "t1.ok is false");
    }

    #[test]
    fn in_and_not_in() {
        let p = col("a").in_list([1i32, 2, 3]);
        assert_eq!(p.to_qualified_sql(), "t1.a in (?, ?, ?)");
        assert_eq!(p.values(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(
            col("a").not_in(["x", "y"]).to_qualified_sql(),
            "t1.a not in (?, ?)"
        );
    }

    #[test]
    fn between_and_not_between() {
        assert_eq!(
            col("a").between(1i32, 5i32).to_qualified_sql(),
            "t1.a BETWEEN ? AND ?"
        );
        assert_eq!(
            col("a").not_between(1i32, 5i32).to_qualified_sql(),
            "not (t1.a BETWEEN ? AND ?)"
        );
    }

    #[test]
    fn not_renders_and_keeps_values() {
        let p = col("a").eq("x").and(col("b").greater_than(3i64));
        let negated = !p.clone();
        assert_eq!(negated.to_qualified_sql(), format!("not ({})", p.to_qualified_sql()));
        assert_eq!(negated.values(), p.values());
    }

    #[test]
    fn empty_and_or_fail() {
        assert_eq!(
            Predicate::all(vec![]).unwrap_err().to_string(),
            "And requires at least one condition"
        );
        assert_eq!(
            Predicate::any(vec![]).unwrap_err().to_string(),
            "Or requires at least one condition"
        );
    }

    #[test]
    fn single_operand_renders_like_operand() {
        let p = col("a").eq(1i32);
        let or = Predicate::any(vec![p.clone()]).unwrap();
        let and = Predicate::all(vec![p.clone()]).unwrap();
        assert_eq!(or.to_qualified_sql(), p.to_qualified_sql());
        assert_eq!(and.to_qualified_sql(), p.to_qualified_sql());
    }

    #[test]
    fn or_is_parenthesized_and_and_is_not() {
        let p = col("a").eq(1i32).or(col("b").eq(2i32));
        assert_eq!(p.to_qualified_sql(), "(t1.a = ? or t1.b = ?)");
        let q = col("a").eq(1i32) + col("b").eq(2i32);
        assert_eq!(q.to_qualified_sql(), "t1.a = ? and t1.b = ?");
    }

    #[test]
    fn empty_in_list_is_constant() {
        let p = col("a").in_list(Vec::<i32>::new());
        assert_eq!(p.to_qualified_sql(), "1=0");
        assert!(p.values().is_empty());
        assert_eq!(col("a").not_in(Vec::<i32>::new()).to_qualified_sql(), "1=1");
    }

    #[test]
    fn conditions_as_operands_are_grouped() {
        let both = col("a").eq(1i32).and(col("b").eq(2i32));
        assert_eq!(
            both.clone().into_expr().eq(false).to_qualified_sql(),
            "(t1.a = ? and t1.b = ?) = ?"
        );
        assert_eq!(
            both.into_expr().is_not_null().to_qualified_sql(),
            "(t1.a = ? and t1.b = ?) is not null"
        );

        let either = col("a").eq(1i32).or(col("b").eq(2i32));
        assert_eq!(
            either.into_expr().eq(true).to_qualified_sql(),
            "(t1.a = ? or t1.b = ?) = ?"
        );
        let negated = !col("a").is_null();
        assert_eq!(
            negated.into_expr().eq(true).to_qualified_sql(),
            "(not (t1.a is null)) = ?"
        );
    }
}
