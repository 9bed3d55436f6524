use serde::Serialize;
use crate::core::types::Value;

/// Positional parameter of a generated statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParam {
    pub name: String,
    pub value: Value,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        QueryParam { name: name.into(), value }
    }
}

/// Parameterized statement ready for a `DbClient`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlCommand {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl SqlCommand {
    pub fn new(sql: impl Into<String>, params: Vec<QueryParam>) -> Self {
        SqlCommand { sql: sql.into(), params }
    }

    pub fn text(sql: impl Into<String>) -> Self {
        SqlCommand { sql: sql.into(), params: Vec::new() }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// Hands out `@p0`, `@p1`, ... in the order values are added
#[derive(Debug, Clone, Default)]
pub struct Params {
    params: Vec<QueryParam>,
}

impl Params {
    pub fn new() -> Self {
        Params { params: Vec::new() }
    }

    pub fn add(&mut self, value: Value) -> String {
        let name = format!("@p{}", self.params.len());
        self.params.push(QueryParam::new(name.clone(), value));
        name
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_vec(self) -> Vec<QueryParam> {
        self.params
    }
}
