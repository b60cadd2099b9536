//! SQL expressions for WHERE clauses.

use sqlmapper_core::{Dialect, Result, Value, check_column};

/// A SQL expression that can be used in WHERE clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, validated when rendered
    Column(String),

    /// Literal value, always rendered as a bound parameter
    Literal(Value),

    /// Binary operation (e.g., a = b, a > b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// NOT expr
    Not(Box<Expr>),

    /// IN expression
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// BETWEEN expression
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE / NOT LIKE pattern
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Get the precedence of this operator (higher = binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

impl Expr {
    // ==================== Constructors ====================

    /// Create a column reference expression.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// Create a literal value expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    // ==================== Comparison Operators ====================

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ==================== Logical Operators ====================

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Wrap in parentheses.
    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    // ==================== Predicates ====================

    /// IN list of values.
    pub fn in_list(self, values: Vec<Expr>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values,
            negated: false,
        }
    }

    /// NOT IN list of values.
    pub fn not_in(self, values: Vec<Expr>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values,
            negated: true,
        }
    }

    /// BETWEEN low AND high
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// LIKE pattern (pattern is passed through as written)
    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// NOT LIKE pattern
    pub fn not_like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: true,
        }
    }

    // ==================== Rendering ====================

    /// Render with the default dialect.
    #[allow(clippy::result_large_err)]
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> Result<String> {
        self.build_with_dialect(Dialect::default(), params, offset)
    }

    /// Render as SQL, appending bound values to `params`.
    ///
    /// Placeholders are numbered from `offset + 1`. Column names are checked
    /// against the identifier rules and rejected with a syntax error.
    #[allow(clippy::result_large_err)]
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> Result<String> {
        let sql = match self {
            Expr::Column(name) => {
                check_column(name)?;
                dialect.quote_identifier(name)
            }

            Expr::Literal(value) => {
                params.push(value.clone());
                dialect.placeholder(offset + params.len())
            }

            Expr::Binary { left, op, right } => {
                let left_sql = left.build_operand(*op, dialect, params, offset)?;
                let right_sql = right.build_operand(*op, dialect, params, offset)?;
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::Not(expr) => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset)?;
                if matches!(**expr, Expr::Binary { .. }) {
                    format!("NOT ({expr_sql})")
                } else {
                    format!("NOT {expr_sql}")
                }
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset)?;
                if values.is_empty() {
                    // Nothing is IN an empty set; everything is NOT IN it.
                    return Ok(if *negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let value_sqls = values
                    .iter()
                    .map(|v| v.build_with_dialect(dialect, params, offset))
                    .collect::<Result<Vec<_>>>()?;
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset)?;
                let low_sql = low.build_with_dialect(dialect, params, offset)?;
                let high_sql = high.build_with_dialect(dialect, params, offset)?;
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}BETWEEN {low_sql} AND {high_sql}")
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset)?;
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset)?;
                params.push(Value::Text(pattern.clone()));
                let param = dialect.placeholder(offset + params.len());
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}LIKE {param}")
            }

            Expr::Paren(expr) => {
                format!("({})", expr.build_with_dialect(dialect, params, offset)?)
            }
        };
        Ok(sql)
    }

    /// Render an operand of `parent`, parenthesizing looser-binding children.
    fn build_operand(
        &self,
        parent: BinaryOp,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> Result<String> {
        let sql = self.build_with_dialect(dialect, params, offset)?;
        match self {
            Expr::Binary { op, .. } if op.precedence() < parent.precedence() => Ok(format!("({sql})")),
            _ => Ok(sql),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::Error;

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = expr
            .build_with_dialect(Dialect::Sqlite, &mut params, 0)
            .unwrap();
        (sql, params)
    }

    #[test]
    fn test_comparison_binds_literal() {
        let (sql, params) = render(&Expr::col("age").gt(Expr::lit(18)));
        assert_eq!(sql, "\"age\" > ?1");
        assert_eq!(params, vec![Value::Int(18)]);
    }

    #[test]
    fn test_offset_numbers_placeholders() {
        let mut params = vec![Value::Int(0)];
        let sql = Expr::col("id")
            .eq(Expr::lit(5_i64))
            .build_with_dialect(Dialect::Postgres, &mut params, 2)
            .unwrap();
        assert_eq!(sql, "\"id\" = $4");
    }

    #[test]
    fn test_and_or_grouping() {
        let a = Expr::col("a").eq(Expr::lit(1));
        let b = Expr::col("b").eq(Expr::lit(2));
        let c = Expr::col("c").eq(Expr::lit(3));

        let (sql, _) = render(&a.clone().and(b.clone()).or(c.clone()));
        assert_eq!(sql, "\"a\" = ?1 AND \"b\" = ?2 OR \"c\" = ?3");

        let (sql, _) = render(&a.or(b).and(c));
        assert_eq!(sql, "(\"a\" = ?1 OR \"b\" = ?2) AND \"c\" = ?3");
    }

    #[test]
    fn test_in_list() {
        let (sql, params) = render(&Expr::col("id").in_list(vec![Expr::lit(1), Expr::lit(2)]));
        assert_eq!(sql, "\"id\" IN (?1, ?2)");
        assert_eq!(params.len(), 2);

        let (sql, params) = render(&Expr::col("id").in_list(Vec::new()));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());

        let (sql, _) = render(&Expr::col("id").not_in(Vec::new()));
        assert_eq!(sql, "1 = 1");
    }

    #[test]
    fn test_between_like_null() {
        let (sql, _) = render(&Expr::col("age").between(Expr::lit(1), Expr::lit(9)));
        assert_eq!(sql, "\"age\" BETWEEN ?1 AND ?2");

        let (sql, params) = render(&Expr::col("name").not_like("%bob%"));
        assert_eq!(sql, "\"name\" NOT LIKE ?1");
        assert_eq!(params, vec![Value::Text("%bob%".into())]);

        let (sql, _) = render(&Expr::col("email").is_not_null());
        assert_eq!(sql, "\"email\" IS NOT NULL");
    }

    #[test]
    fn test_not_wraps_binary() {
        let (sql, _) = render(&Expr::col("a").eq(Expr::lit(1)).not());
        assert_eq!(sql, "NOT (\"a\" = ?1)");
    }

    #[test]
    fn test_invalid_column_rejected() {
        let mut params = Vec::new();
        let err = Expr::col("id; DROP TABLE users")
            .eq(Expr::lit(1))
            .build(&mut params, 0)
            .unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }
}
