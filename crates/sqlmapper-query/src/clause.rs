//! SQL clause types (ORDER BY, LIMIT/OFFSET).

use sqlmapper_core::{Dialect, Result, check_column};

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    /// Generate SQL for this ORDER BY term.
    #[allow(clippy::result_large_err)]
    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        check_column(&self.column)?;
        let dir = match self.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        Ok(format!("{} {dir}", dialect.quote_identifier(&self.column)))
    }
}

/// LIMIT/OFFSET pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub limit: u64,
    pub offset: u64,
}

impl Limit {
    pub fn to_sql(self) -> String {
        if self.offset == 0 {
            format!("LIMIT {}", self.limit)
        } else {
            format!("LIMIT {} OFFSET {}", self.limit, self.offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_sql() {
        assert_eq!(
            OrderBy::asc("name").to_sql(Dialect::Sqlite).unwrap(),
            "\"name\" ASC"
        );
        assert_eq!(
            OrderBy::desc("age").to_sql(Dialect::Mysql).unwrap(),
            "`age` DESC"
        );
        assert!(OrderBy::asc("age desc, 1").to_sql(Dialect::Sqlite).is_err());
    }

    #[test]
    fn test_limit_sql() {
        assert_eq!(Limit { limit: 10, offset: 0 }.to_sql(), "LIMIT 10");
        assert_eq!(
            Limit { limit: 10, offset: 20 }.to_sql(),
            "LIMIT 10 OFFSET 20"
        );
    }
}
