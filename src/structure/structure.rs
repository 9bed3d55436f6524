use serde::Serialize;
use crate::core::error::{Error, ErrorKind, Result};
use crate::structure::id::StructureId;
use crate::structure::index::StructureIndex;

/// Canonical persisted form of one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    pub body: String,
    pub indexes: Vec<StructureIndex>,
    pub uniques: Vec<StructureIndex>,
}

impl Structure {
    /// Uniques are derived from the indexes. A unique member may only
    /// appear once among the indexes of one structure.
    pub fn new(
        id: StructureId,
        name: impl Into<String>,
        body: String,
        indexes: Vec<StructureIndex>,
    ) -> Result<Self> {
        let name = name.into();
        let uniques: Vec<StructureIndex> = indexes
            .iter()
            .filter(|index| index.is_unique())
            .cloned()
            .collect();

        for unique in &uniques {
            let occurrences = indexes.iter().filter(|i| i.path == unique.path).count();
            if occurrences > 1 {
                return Err(Error::new(
                    ErrorKind::UniqueMultipleValues,
                    format!(
                        "Unique index '{}' of structure '{}' ({}) cannot carry multiple values",
                        unique.path, name, id
                    ),
                ));
            }
        }

        Ok(Structure {
            id,
            name,
            body,
            indexes,
            uniques,
        })
    }

    pub fn index(&self, path: &str) -> Option<&StructureIndex> {
        self.indexes.iter().find(|i| i.path == path)
    }
}
