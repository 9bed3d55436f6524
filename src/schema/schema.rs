use std::collections::HashSet;
use std::sync::OnceLock;
use regex::Regex;
use serde::{Serialize, Deserialize};
use serde_json::Value as Json;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataTypeFamily, UniqueMode, Value};
use crate::structure::id::{IdKind, StructureId};
use crate::structure::index::to_composite;

fn identifier() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Member holding the structure identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAccessor {
    pub path: String,
    pub kind: IdKind,
}

/// Schema-level descriptor of one indexable member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAccessor {
    pub path: String,
    pub family: DataTypeFamily,
    pub unique: Option<UniqueMode>,
    pub is_enumerable: bool,  // Member is itself a collection
    pub is_element: bool,     // Path passes through a collection
}

impl IndexAccessor {
    pub fn is_unique(&self) -> bool {
        self.unique.is_some()
    }

    /// Collection-bound members can yield several values and are always
    /// stored as one composite string.
    pub fn is_collection(&self) -> bool {
        self.is_enumerable || self.is_element
    }

    /// Family the stored values have
    pub fn storage_family(&self) -> DataTypeFamily {
        if self.is_collection() && self.family != DataTypeFamily::Text {
            DataTypeFamily::String
        } else {
            self.family
        }
    }

    /// Read the member's raw values from the JSON form of an item. Missing
    /// and null members yield nothing.
    pub fn read_values(&self, item: &Json) -> Result<Vec<Value>> {
        let mut current: Vec<&Json> = vec![item];
        for segment in self.path.split('.') {
            let mut next = Vec::new();
            for node in current {
                collect_member(node, segment, &mut next);
            }
            current = next;
        }

        let mut values = Vec::with_capacity(current.len());
        for node in current {
            match node {
                Json::Null => {}
                Json::Array(items) => {
                    for item in items.iter().filter(|i| !i.is_null()) {
                        values.push(Value::from_json(item, self.family)?);
                    }
                }
                other => values.push(Value::from_json(other, self.family)?),
            }
        }
        Ok(values)
    }

    /// Value to store for this member: verbatim for one scalar, composite
    /// for collection-bound members and for textual members whose path
    /// yields several values. Several values of any other family cannot be
    /// stored in the member's table.
    pub fn index_value(&self, values: &[Value]) -> Result<Value> {
        if self.is_collection() {
            return Ok(to_composite(values));
        }
        match values {
            [] => Ok(Value::Null),
            [single] => Ok(single.clone()),
            _ if self.family.is_textual() => Ok(to_composite(values)),
            _ => Err(Error::new(
                ErrorKind::SchemaMismatch,
                format!(
                    "Member '{}' yielded {} {:?} values; declare it as an element member",
                    self.path,
                    values.len(),
                    self.family
                ),
            )),
        }
    }
}

fn collect_member<'a>(node: &'a Json, segment: &str, out: &mut Vec<&'a Json>) {
    match node {
        Json::Object(map) => {
            if let Some(member) = map.get(segment) {
                out.push(member);
            }
        }
        Json::Array(items) => {
            for item in items {
                collect_member(item, segment, out);
            }
        }
        _ => {}
    }
}

/// Mapping metadata of one structure type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSchema {
    pub name: String,
    pub id_accessor: IdAccessor,
    pub index_accessors: Vec<IndexAccessor>,
}

impl StructureSchema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn accessor(&self, path: &str) -> Option<&IndexAccessor> {
        self.index_accessors.iter().find(|a| a.path == path)
    }

    pub fn is_id_member(&self, path: &str) -> bool {
        self.id_accessor.path == path
    }

    pub fn unique_accessors(&self) -> impl Iterator<Item = &IndexAccessor> {
        self.index_accessors.iter().filter(|a| a.is_unique())
    }

    /// Identity currently held by the item's JSON form, if assigned
    pub fn read_id(&self, item: &Json) -> Result<Option<StructureId>> {
        let raw = item.get(&self.id_accessor.path).unwrap_or(&Json::Null);
        match (self.id_accessor.kind, raw) {
            (_, Json::Null) => Ok(None),
            (IdKind::Identity, Json::Number(n)) => match n.as_i64() {
                Some(v) if v >= 1 => Ok(Some(StructureId::Identity(v))),
                _ => Ok(None),
            },
            (IdKind::Guid, Json::String(s)) => match uuid::Uuid::parse_str(s) {
                Ok(g) if !g.is_nil() => Ok(Some(StructureId::Guid(g))),
                Ok(_) => Ok(None),
                Err(e) => Err(Error::new(
                    ErrorKind::InvalidIdentity,
                    format!("Invalid guid identity '{}': {}", s, e),
                )),
            },
            (kind, other) => Err(Error::new(
                ErrorKind::InvalidIdentity,
                format!("Identity member '{}' holds {} which is not a {:?}", self.id_accessor.path, other, kind),
            )),
        }
    }
}

pub struct SchemaBuilder {
    name: String,
    id_accessor: Option<IdAccessor>,
    index_accessors: Vec<IndexAccessor>,
}

impl SchemaBuilder {
    pub fn new(name: &str) -> Self {
        SchemaBuilder {
            name: name.to_string(),
            id_accessor: None,
            index_accessors: Vec::new(),
        }
    }

    pub fn guid_id(mut self, path: &str) -> Self {
        self.id_accessor = Some(IdAccessor { path: path.to_string(), kind: IdKind::Guid });
        self
    }

    pub fn identity_id(mut self, path: &str) -> Self {
        self.id_accessor = Some(IdAccessor { path: path.to_string(), kind: IdKind::Identity });
        self
    }

    pub fn index(self, path: &str, family: DataTypeFamily) -> Self {
        self.accessor(path, family, None, false, false)
    }

    pub fn unique(self, path: &str, family: DataTypeFamily, mode: UniqueMode) -> Self {
        self.accessor(path, family, Some(mode), false, false)
    }

    /// Member that is itself a collection of scalars, e.g. `Tags`
    pub fn enumerable(self, path: &str, family: DataTypeFamily) -> Self {
        self.accessor(path, family, None, true, false)
    }

    /// Member of elements of a nested collection, e.g. `Lines.ProductNo`
    pub fn element(self, path: &str, family: DataTypeFamily) -> Self {
        self.accessor(path, family, None, false, true)
    }

    pub fn accessor(
        mut self,
        path: &str,
        family: DataTypeFamily,
        unique: Option<UniqueMode>,
        is_enumerable: bool,
        is_element: bool,
    ) -> Self {
        self.index_accessors.push(IndexAccessor {
            path: path.to_string(),
            family,
            unique,
            is_enumerable,
            is_element,
        });
        self
    }

    pub fn build(self) -> Result<StructureSchema> {
        if !identifier().is_match(&self.name) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("'{}' is not a valid structure name", self.name),
            ));
        }

        let id_accessor = self.id_accessor.ok_or_else(|| Error::new(
            ErrorKind::InvalidArgument,
            format!("Structure '{}' has no identity member", self.name),
        ))?;
        validate_path(&id_accessor.path)?;
        if id_accessor.path.contains('.') {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("Identity member '{}' must be a root member", id_accessor.path),
            ));
        }

        let mut seen = HashSet::new();
        for accessor in &self.index_accessors {
            validate_path(&accessor.path)?;
            if accessor.path == id_accessor.path {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("Identity member '{}' cannot also be an index", accessor.path),
                ));
            }
            if !seen.insert(accessor.path.as_str()) {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("Member '{}' is indexed twice", accessor.path),
                ));
            }
        }

        Ok(StructureSchema {
            name: self.name,
            id_accessor,
            index_accessors: self.index_accessors,
        })
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.split('.').all(|segment| identifier().is_match(segment)) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("'{}' is not a valid member path", path),
        ))
    }
}
