//! Expression layer: columns, literals, functions, casts and aliases.
//!
//! Every node renders a SQL fragment with `?` placeholders and yields the bind
//! values it owns in the same left-to-right order as they appear in the text.
//!
//! ```ignore
//! use buddy::{Expression, lower, count};
//!
//! let name = person.column("name")?;
//! let p = lower(&name).eq("ann");          // lower(person0.name) = ?
//! let c = count().alias("total");          // count(*) AS total
//! ```

use crate::predicate::Predicate;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Something that renders into a SQL fragment and owns bind values.
pub trait QueryPart {
    /// Append the fragment to `out`. `qualified` prefixes column references
    /// with their table alias.
    fn write_sql(&self, out: &mut String, qualified: bool);

    /// Append owned bind values in textual order.
    fn collect_values(&self, out: &mut Vec<Value>) {
        let _ = out;
    }

    fn render(&self, qualified: bool) -> String {
        let mut out = String::new();
        self.write_sql(&mut out, qualified);
        out
    }

    /// Fragment as embedded in WHERE/ON/SELECT clauses.
    fn to_qualified_sql(&self) -> String {
        self.render(true)
    }

    /// Unqualified fragment, used for RETURNING lists and generated-key requests.
    fn to_sql(&self) -> String {
        self.render(false)
    }

    fn values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.collect_values(&mut out);
        out
    }
}

/// A column of one table occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub(crate) alias: Arc<str>,
    pub(crate) name: Arc<str>,
}

impl ColumnRef {
    pub fn new(alias: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `alias.column` (qualified) or `column` (bare)
    Column(ColumnRef),
    /// A bound value, rendered as `?`
    Literal(Value),
    /// `name(arg, ...)`
    Function { name: String, args: Vec<Expr> },
    /// `CAST (expr as type)`
    Cast { expr: Box<Expr>, type_name: String },
    /// `expr AS alias`
    Alias { expr: Box<Expr>, alias: String },
    /// `*`
    Asterisk,
    /// `expr->>'field'`
    JsonField { expr: Box<Expr>, field: String },
    /// A predicate used as a boolean expression
    Condition(Box<Predicate>),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn is_asterisk(&self) -> bool {
        matches!(self, Expr::Asterisk)
    }
}

impl QueryPart for Expr {
    fn write_sql(&self, out: &mut String, qualified: bool) {
        match self {
            Expr::Column(column) => {
                if qualified {
                    out.push_str(&column.alias);
                    out.push('.');
                }
                out.push_str(&column.name);
            }
            Expr::Literal(_) => out.push('?'),
            Expr::Function { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.write_sql(out, true);
                }
                out.push(')');
            }
            Expr::Cast { expr, type_name } => {
                out.push_str("CAST (");
                expr.write_sql(out, true);
                out.push_str(" as ");
                out.push_str(type_name);
                out.push(')');
            }
            Expr::Alias { expr, alias } => {
                expr.write_sql(out, true);
                out.push_str(" AS ");
                out.push_str(alias);
            }
            Expr::Asterisk => out.push('*'),
            Expr::JsonField { expr, field } => {
                expr.write_sql(out, true);
                out.push_str("->>'");
                out.push_str(field);
                out.push('\'');
            }
            // a condition used as an operand keeps its own grouping
            Expr::Condition(predicate) => match predicate.as_ref() {
                Predicate::Or(parts) if parts.len() > 1 => predicate.write_sql(out, qualified),
                _ => {
                    out.push('(');
                    predicate.write_sql(out, qualified);
                    out.push(')');
                }
            },
        }
    }

    fn collect_values(&self, out: &mut Vec<Value>) {
        match self {
            Expr::Column(_) | Expr::Asterisk => {}
            Expr::Literal(value) => out.push(value.clone()),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_values(out);
                }
            }
            Expr::Cast { expr, .. } | Expr::Alias { expr, .. } | Expr::JsonField { expr, .. } => {
                expr.collect_values(out)
            }
            Expr::Condition(predicate) => predicate.collect_values(out),
        }
    }
}

/// Conversion into an expression operand. Plain values become literals.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::Literal(self)
    }
}

impl IntoExpr for Predicate {
    fn into_expr(self) -> Expr {
        Expr::Condition(Box::new(self))
    }
}

impl<T: Into<Value>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::Literal(self.into())
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {$(
        impl IntoExpr for $ty {
            fn into_expr(self) -> Expr {
                Expr::Literal(Value::from(self))
            }
        }
    )*};
}

literal_operand!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    serde_json::Value,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
);

/// Comparison, membership and shaping operations shared by every expression
/// operand (columns, function calls, casts, ...).
pub trait Expression: IntoExpr + Sized {
    fn eq(self, other: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), "=", other.into_expr())
    }

    fn not_equal(self, other: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), "<>", other.into_expr())
    }

    fn less_than(self, other: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), "<", other.into_expr())
    }

    fn less_or_equal(self, other: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), "<=", other.into_expr())
    }

    fn greater_than(self, other: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), ">", other.into_expr())
    }

    fn greater_or_equal(self, other: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), ">=", other.into_expr())
    }

    fn like(self, pattern: impl IntoExpr) -> Predicate {
        Predicate::binary(self.into_expr(), "like", pattern.into_expr())
    }

    /// Case-insensitive LIKE, rewritten as `lower(x) like lower(y)`.
    fn ilike(self, pattern: impl IntoExpr) -> Predicate {
        Predicate::binary(lower(self), "like", lower(pattern))
    }

    fn in_list<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        Predicate::In {
            expr: self.into_expr(),
            values: values.into_iter().map(IntoExpr::into_expr).collect(),
            negated: false,
        }
    }

    fn not_in<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        Predicate::In {
            expr: self.into_expr(),
            values: values.into_iter().map(IntoExpr::into_expr).collect(),
            negated: true,
        }
    }

    fn between(self, lower: impl IntoExpr, upper: impl IntoExpr) -> Predicate {
        Predicate::Between {
            expr: self.into_expr(),
            lower: lower.into_expr(),
            upper: upper.into_expr(),
        }
    }

    fn not_between(self, lower: impl IntoExpr, upper: impl IntoExpr) -> Predicate {
        !self.between(lower, upper)
    }

    fn is_null(self) -> Predicate {
        Predicate::unary(self.into_expr(), "is null")
    }

    fn is_not_null(self) -> Predicate {
        Predicate::unary(self.into_expr(), "is not null")
    }

    fn is_true(self) -> Predicate {
        Predicate::unary(self.into_expr(), "is true")
    }

    fn is_false(self) -> Predicate {
        Predicate::unary(self.into_expr(), "is false")
    }

    fn cast(self, type_name: impl Into<String>) -> Expr {
        Expr::Cast {
            expr: Box::new(self.into_expr()),
            type_name: type_name.into(),
        }
    }

    fn alias(self, alias: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self.into_expr()),
            alias: alias.into(),
        }
    }

    /// Text value of a JSON document field (`->>`).
    fn json_get(self, field: impl Into<String>) -> Expr {
        Expr::JsonField {
            expr: Box::new(self.into_expr()),
            field: field.into(),
        }
    }

    fn asc(self) -> Order {
        Order::new(self, Direction::Asc)
    }

    fn desc(self) -> Order {
        Order::new(self, Direction::Desc)
    }
}

impl Expression for Expr {}
impl Expression for &Expr {}

/// Generic SQL function call.
pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

pub fn lower(value: impl IntoExpr) -> Expr {
    function("lower", vec![value.into_expr()])
}

pub fn upper(value: impl IntoExpr) -> Expr {
    function("upper", vec![value.into_expr()])
}

/// `count(*)`
pub fn count() -> Expr {
    function("count", vec![Expr::Asterisk])
}

pub fn concat(value: impl IntoExpr, other: impl IntoExpr) -> Expr {
    function("concat", vec![value.into_expr(), other.into_expr()])
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// ORDER BY item. NULL keys always sort last.
#[derive(Debug, Clone)]
pub struct Order {
    expr: Expr,
    direction: Direction,
}

impl Order {
    pub fn new(expr: impl IntoExpr, direction: Direction) -> Self {
        Self {
            expr: expr.into_expr(),
            direction,
        }
    }

    pub fn asc(expr: impl IntoExpr) -> Self {
        Self::new(expr, Direction::Asc)
    }

    pub fn desc(expr: impl IntoExpr) -> Self {
        Self::new(expr, Direction::Desc)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl QueryPart for Order {
    fn write_sql(&self, out: &mut String, qualified: bool) {
        self.expr.write_sql(out, qualified);
        out.push(' ');
        out.push_str(self.direction.as_str());
        out.push_str(" NULLS LAST");
    }

    fn collect_values(&self, out: &mut Vec<Value>) {
        self.expr.collect_values(out);
    }
}
