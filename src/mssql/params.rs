use tiberius::Query;

use crate::types::DbValue;

/// Build a query with every value bound to its `@Pn` placeholder, in order.
pub fn bind_query_params<'a>(sql: &'a str, params: &[DbValue]) -> Query<'a> {
    let mut query = Query::new(sql);
    for param in params {
        match param {
            DbValue::Null => query.bind(Option::<String>::None),
            DbValue::Int(i) => query.bind(*i),
            DbValue::Float(f) => query.bind(*f),
            DbValue::Bool(b) => query.bind(*b),
            DbValue::Timestamp(dt) => query.bind(*dt),
            DbValue::Text(s) => query.bind(s.clone()),
            DbValue::Json(j) => query.bind(j.to_string()),
            DbValue::Blob(bytes) => query.bind(bytes.clone()),
        }
    }
    query
}
