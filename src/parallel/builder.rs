use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::schema::StructureSchema;
use crate::structure::builder::{BodySerializer, StructureBuilder, StructureItem};
use crate::structure::id::{IdKind, IdentityCheckout, IdentityRange};
use crate::structure::structure::Structure;

/// Builds structures for a batch of items on a bounded worker pool
pub struct ParallelStructureBuilder {
    pub workers: usize,
    pub progress: Arc<AtomicUsize>,
    pool: rayon::ThreadPool,
}

impl ParallelStructureBuilder {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("structure-builder-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("Failed to start builder pool: {}", e)))?;

        Ok(ParallelStructureBuilder {
            workers,
            progress: Arc::new(AtomicUsize::new(0)),
            pool,
        })
    }

    /// Items built so far in the current batch
    pub fn get_progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Build all items. The result has the input order, so item `n` gets
    /// `range.start + n` when an identity range is given.
    pub fn build_many<T>(
        &self,
        schema: &StructureSchema,
        serializer: &dyn BodySerializer,
        items: &mut [T],
        range: Option<IdentityRange>,
    ) -> Result<Vec<Structure>>
    where
        T: StructureItem + Send,
    {
        self.progress.store(0, Ordering::Relaxed);
        let builder = StructureBuilder::new(schema, serializer);
        let total = items.len();

        let structures = self.pool.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .map(|(offset, item)| {
                    let checked_out = range.map(|r| r.at(offset)).transpose()?;
                    let structure = builder.build_with_id(item, checked_out)?;
                    self.progress.fetch_add(1, Ordering::Relaxed);
                    Ok(structure)
                })
                .collect::<Result<Vec<Structure>>>()
        })?;

        debug!(structure = %schema.name, count = total, workers = self.workers, "built structures");
        Ok(structures)
    }

    /// Build all items, checking out one contiguous identity range first
    /// when the structure type uses integer identities.
    pub fn build_many_with_checkout<T>(
        &self,
        schema: &StructureSchema,
        serializer: &dyn BodySerializer,
        items: &mut [T],
        checkout: &mut dyn IdentityCheckout,
    ) -> Result<Vec<Structure>>
    where
        T: StructureItem + Send,
    {
        let range = match schema.id_accessor.kind {
            IdKind::Identity if !items.is_empty() => Some(checkout.checkout(&schema.name, items.len())?),
            _ => None,
        };
        self.build_many(schema, serializer, items, range)
    }
}
