use sqlx::{self, postgres::PgArguments, FromRow};

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Float(f64),
    Integer(i64),
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Integer(v)
    }
}

/// Rendered query text plus its parameters in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Appends conditions to a base `SELECT ... WHERE 1=1` query.
///
/// Placeholders are never numbered by hand: a bound value is pushed onto the
/// parameter list first and its placeholder is rendered from the list's new
/// length, so `$n` always refers to `params[n - 1]`.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    sql: String,
    params: Vec<SqlParam>,
}

impl QueryBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            sql: base.into(),
            params: vec![],
        }
    }

    /// Append a condition made only of fixed text (no caller-supplied values)
    pub fn and_where(&mut self, condition: &'static str) -> &mut Self {
        self.sql.push_str(" AND ");
        self.sql.push_str(condition);
        self
    }

    /// Append `AND <lhs> $n`, binding `value` as parameter `n`
    pub fn and_where_bound(&mut self, lhs: &'static str, value: impl Into<SqlParam>) -> &mut Self {
        let placeholder = self.push_param(value);
        self.sql.push_str(&format!(" AND {} {}", lhs, placeholder));
        self
    }

    pub fn order_by(&mut self, column: &'static str) -> &mut Self {
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(column);
        self
    }

    pub fn limit(&mut self, value: i64) -> &mut Self {
        let placeholder = self.push_param(value);
        self.sql.push_str(&format!(" LIMIT {}", placeholder));
        self
    }

    pub fn build(self) -> SqlQuery {
        SqlQuery {
            query: self.sql,
            params: self.params,
        }
    }

    fn push_param(&mut self, value: impl Into<SqlParam>) -> String {
        self.params.push(value.into());
        format!("${}", self.params.len())
    }
}

/// Bind `params` in placeholder order onto a typed query
pub fn bind_params<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    for p in params {
        q = match p {
            SqlParam::Text(s) => q.bind(s.as_str()),
            SqlParam::Float(f) => q.bind(*f),
            SqlParam::Integer(i) => q.bind(*i),
        };
    }
    q
}

/// Positional placeholders in the order they appear in `query`
#[cfg(test)]
pub(crate) fn placeholder_positions(query: &str) -> Vec<usize> {
    let bytes = query.as_bytes();
    let mut positions = vec![];
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                positions.push(query[start..end].parse().unwrap());
            }
            i = end.max(start);
        } else {
            i += 1;
        }
    }
    positions
}
