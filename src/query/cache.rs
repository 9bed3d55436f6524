use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use crate::core::error::Result;
use crate::query::command::SqlCommand;
use crate::query::dialect::DialectKind;
use crate::query::generator::{QueryGenerator, QueryShape};
use crate::query::query::Query;
use crate::schema::schema::StructureSchema;

/// Generated-statement cache for avoiding recompilation of repeated queries
pub struct QueryCache {
    cache: Mutex<LruCache<QueryKey, SqlCommand>>,
    pub size_limit: usize,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

/// Everything the generated text depends on
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QueryKey {
    pub dialect: DialectKind,
    pub shape: QueryShape,
    pub schema: String,  // Canonical form of the structure schema
    pub query: String,   // Canonical form of the parsed query, values included
}

impl QueryKey {
    pub fn new(dialect: DialectKind, schema: &StructureSchema, query: &Query, shape: QueryShape) -> Self {
        QueryKey {
            dialect,
            shape,
            schema: format!("{:?}", schema),
            query: format!("{:?}", query),
        }
    }
}

impl QueryCache {
    pub fn new(size_limit: usize) -> Self {
        let cap = NonZeroUsize::new(size_limit.max(1)).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            cache: Mutex::new(LruCache::new(cap)),
            size_limit,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<SqlCommand> {
        let mut cache = self.cache.lock();
        if let Some(command) = cache.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            Some(command.clone())
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn put(&self, key: QueryKey, command: SqlCommand) {
        self.cache.lock().put(key, command);
    }

    /// Return the cached statement or generate and remember it
    pub fn get_or_generate(
        &self,
        generator: &QueryGenerator,
        schema: &StructureSchema,
        query: &Query,
        shape: QueryShape,
    ) -> Result<SqlCommand> {
        let key = QueryKey::new(generator.dialect().kind(), schema, query, shape);
        if let Some(command) = self.get(&key) {
            return Ok(command);
        }
        let command = generator.generate_shape(schema, query, shape)?;
        self.put(key, command.clone());
        Ok(command)
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.lock().len(),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::types::DataTypeFamily;
    use crate::query::query::QueryBuilder;

    #[test]
    fn repeated_queries_hit() {
        let schema = StructureSchema::builder("Item")
            .guid_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .build()
            .unwrap();
        let generator = QueryGenerator::new(&Config::default());
        let cache = QueryCache::new(8);

        let q1 = QueryBuilder::new(&schema).filter("i => i.Int1 == 1").unwrap().build();
        let q2 = QueryBuilder::new(&schema).filter("i => i.Int1 == 2").unwrap().build();

        let first = cache.get_or_generate(&generator, &schema, &q1, QueryShape::Full).unwrap();
        let again = cache.get_or_generate(&generator, &schema, &q1, QueryShape::Full).unwrap();
        cache.get_or_generate(&generator, &schema, &q2, QueryShape::Full).unwrap();
        cache.get_or_generate(&generator, &schema, &q1, QueryShape::Count).unwrap();

        assert_eq!(first, again);
        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 3);
        assert_eq!(stats.size, 3);
        assert!((stats.hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn dialects_and_schemas_do_not_share_entries() {
        let schema = StructureSchema::builder("Item")
            .guid_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .build()
            .unwrap();
        let offset_fetch = QueryGenerator::new(&Config::default().with_dialect(DialectKind::OffsetFetch));
        let row_number = QueryGenerator::new(&Config::default().with_dialect(DialectKind::RowNumber));
        let cache = QueryCache::new(8);
        let query = QueryBuilder::new(&schema).page(1, 10).unwrap().build();

        let native = cache.get_or_generate(&offset_fetch, &schema, &query, QueryShape::Full).unwrap();
        let windowed = cache.get_or_generate(&row_number, &schema, &query, QueryShape::Full).unwrap();
        assert!(native.sql.contains("fetch next"));
        assert!(windowed.sql.contains("row_number()"));
        assert!(!windowed.sql.contains("fetch next"));

        let evolved = StructureSchema::builder("Item")
            .identity_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .build()
            .unwrap();
        cache.get_or_generate(&offset_fetch, &evolved, &query, QueryShape::Full).unwrap();
        assert_eq!(cache.stats().hit_count, 0);
        assert_eq!(cache.stats().size, 3);
    }
}
