use serde::Serialize;
use serde_json::Value as Json;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::UniqueMode;
use crate::schema::schema::{IndexAccessor, StructureSchema};
use crate::structure::id::{IdKind, StructureId};
use crate::structure::index::StructureIndex;
use crate::structure::structure::Structure;

/// An item that can be stored as a structure. The builder reads members
/// from the item's serialized form and writes generated identities back
/// through `assign_structure_id`.
pub trait StructureItem: Serialize {
    fn assign_structure_id(&mut self, id: StructureId);
}

/// Turns an item's JSON form into the stored body text
pub trait BodySerializer: Send + Sync {
    fn serialize(&self, item: &Json) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBodySerializer;

impl BodySerializer for JsonBodySerializer {
    fn serialize(&self, item: &Json) -> Result<String> {
        Ok(serde_json::to_string(item)?)
    }
}

/// Builds structures for one structure type
pub struct StructureBuilder<'a> {
    pub schema: &'a StructureSchema,
    pub serializer: &'a dyn BodySerializer,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(schema: &'a StructureSchema, serializer: &'a dyn BodySerializer) -> Self {
        StructureBuilder { schema, serializer }
    }

    pub fn build<T: StructureItem>(&self, item: &mut T) -> Result<Structure> {
        self.build_with_id(item, None)
    }

    /// Build with an identity checked out for this item. The checked out
    /// identity is only used when the item has none.
    pub fn build_with_id<T: StructureItem>(
        &self,
        item: &mut T,
        checked_out: Option<StructureId>,
    ) -> Result<Structure> {
        let mut json = serde_json::to_value(&*item)?;
        let id = self.resolve_id(item, &mut json, checked_out)?;

        let mut indexes = Vec::with_capacity(self.schema.index_accessors.len());
        for accessor in &self.schema.index_accessors {
            indexes.push(self.build_index(id, accessor, &json)?);
        }

        let body = self.serializer.serialize(&json)?;
        Structure::new(id, self.schema.name.clone(), body, indexes)
    }

    fn resolve_id<T: StructureItem>(
        &self,
        item: &mut T,
        json: &mut Json,
        checked_out: Option<StructureId>,
    ) -> Result<StructureId> {
        if let Some(id) = self.schema.read_id(json)? {
            return Ok(id);
        }

        let id = match self.schema.id_accessor.kind {
            IdKind::Guid => StructureId::new_guid(),
            IdKind::Identity => match checked_out {
                Some(id @ StructureId::Identity(_)) => id,
                _ => return Err(Error::missing_identity(&self.schema.name)),
            },
        };

        item.assign_structure_id(id);
        if let Json::Object(map) = json {
            let raw = match id {
                StructureId::Identity(v) => Json::from(v),
                StructureId::Guid(g) => Json::from(g.hyphenated().to_string()),
            };
            map.insert(self.schema.id_accessor.path.clone(), raw);
        }

        Ok(id)
    }

    fn build_index(
        &self,
        id: StructureId,
        accessor: &IndexAccessor,
        json: &Json,
    ) -> Result<StructureIndex> {
        let values = accessor.read_values(json)?;

        if let Some(mode) = accessor.unique {
            if values.is_empty() {
                return Err(Error::null_unique(&self.schema.name, &accessor.path));
            }
            if values.len() > 1 {
                let has_duplicates = values
                    .iter()
                    .enumerate()
                    .any(|(i, v)| values[..i].contains(v));
                let kind = if has_duplicates && mode == UniqueMode::PerInstance {
                    ErrorKind::DuplicateUniqueValue
                } else {
                    ErrorKind::UniqueMultipleValues
                };
                return Err(Error::new(
                    kind,
                    format!(
                        "Unique member '{}' of '{}' ({}) yielded {} values",
                        accessor.path, self.schema.name, id, values.len()
                    ),
                ));
            }
        }

        Ok(StructureIndex::new(
            id,
            accessor.path.clone(),
            accessor.index_value(&values)?,
            accessor.storage_family(),
            accessor.unique,
        ))
    }
}
