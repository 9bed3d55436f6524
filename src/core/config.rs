use crate::query::dialect::DialectKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub dialect: DialectKind,

    // Write path
    pub bulk_batch_size: usize,            // Rows per bulk-copy batch
    pub build_workers: usize,              // Worker threads for building structures
    pub string_value_max_length: usize,    // Indexed prefix length of string values

    // Query path
    pub max_identifier_length: Option<usize>,  // Overrides the dialect's limit
    pub legacy_has_value_rewrite: bool,        // `HasValue != true` reads as "is not null"
    pub query_cache_size: usize,               // Compiled commands kept per cache
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dialect: DialectKind::OffsetFetch,

            bulk_batch_size: 1000,
            build_workers: num_cpus::get(),
            string_value_max_length: 300,

            max_identifier_length: None,
            legacy_has_value_rewrite: false,
            query_cache_size: 256,
        }
    }
}

impl Config {
    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_bulk_batch_size(mut self, size: usize) -> Self {
        self.bulk_batch_size = size.max(1);
        self
    }

    pub fn with_build_workers(mut self, workers: usize) -> Self {
        self.build_workers = workers.max(1);
        self
    }

    pub fn with_legacy_has_value_rewrite(mut self, legacy: bool) -> Self {
        self.legacy_has_value_rewrite = legacy;
        self
    }
}
