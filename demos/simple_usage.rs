/// structdb walkthrough
///
/// Runs the whole pipeline against the in-memory client:
/// - create the tables of a structure type
/// - build structures in parallel and bulk insert them
/// - compile queries for both dialects
/// - evolve the schema and synchronize

use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;
use structdb::core::config::Config;
use structdb::core::types::{DataTypeFamily, UniqueMode};
use structdb::dac::memory::MemoryClient;
use structdb::parallel::builder::ParallelStructureBuilder;
use structdb::query::dialect::DialectKind;
use structdb::query::generator::QueryGenerator;
use structdb::query::query::QueryBuilder;
use structdb::schema::schema::StructureSchema;
use structdb::structure::builder::{JsonBodySerializer, StructureItem};
use structdb::structure::id::StructureId;
use structdb::sync::synchronizer::{SchemaSynchronizer, SyncMemo};
use structdb::sync::upserter::TableUpserter;
use structdb::writer::bulk::BulkInserter;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Customer {
    id: Option<Uuid>,
    customer_no: i64,
    name: String,
    is_active: bool,
    tags: Vec<String>,
}

impl StructureItem for Customer {
    fn assign_structure_id(&mut self, id: StructureId) {
        if let StructureId::Guid(g) = id {
            self.id = Some(g);
        }
    }
}

fn customer_schema(with_tags: bool) -> structdb::core::error::Result<StructureSchema> {
    let builder = StructureSchema::builder("Customer")
        .guid_id("Id")
        .unique("CustomerNo", DataTypeFamily::Integer, UniqueMode::PerType)
        .index("Name", DataTypeFamily::String)
        .index("IsActive", DataTypeFamily::Boolean);
    let builder = if with_tags { builder.enumerable("Tags", DataTypeFamily::String) } else { builder };
    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║   structdb - Pipeline Walkthrough             ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let config = Config::default();
    let memo = Arc::new(SyncMemo::new());
    let mut client = MemoryClient::new();
    let schema = customer_schema(false)?;

    // Step 1: tables
    println!("Step 1: Creating tables...");
    let synchronizer = SchemaSynchronizer::new(&config, memo.clone());
    let outcome = TableUpserter::new(&synchronizer).upsert(&schema, &mut client)?;
    println!("  Created {} tables\n", outcome.created.len());

    // Step 2: build and insert
    println!("Step 2: Building and inserting customers...");
    let mut customers: Vec<Customer> = (1..=250)
        .map(|n| Customer {
            id: None,
            customer_no: n,
            name: format!("Customer {}", n),
            is_active: n % 3 != 0,
            tags: vec![format!("region-{}", n % 4)],
        })
        .collect();
    let builder = ParallelStructureBuilder::new(config.build_workers)?;
    let structures = builder.build_many(&schema, &JsonBodySerializer, &mut customers, None)?;
    let stats = BulkInserter::new(&config).insert(&schema, &structures, &mut client)?;
    for group in &stats.groups {
        let path = if group.streamed { "bulk copy" } else { "single insert" };
        println!("  {:<20} {:>5} rows ({})", group.table, group.rows, path);
    }
    println!();

    // Step 3: queries
    println!("Step 3: Compiling queries...");
    let query = QueryBuilder::new(&schema)
        .bind("min", 100)
        .filter("c => c.CustomerNo >= min && c.IsActive")?
        .filter("c => c.Name.StartsWith(\"Customer 1\")")?
        .order_by_desc("c => c.CustomerNo")?
        .page(0, 10)?
        .build();
    for dialect in [DialectKind::OffsetFetch, DialectKind::RowNumber] {
        let generator = QueryGenerator::new(&config.clone().with_dialect(dialect));
        let command = generator.generate(&schema, &query)?;
        println!("  {:?}:\n    {}", dialect, command.sql);
        for param in &command.params {
            println!("    {} = {}", param.name, param.value);
        }
    }
    let count = QueryGenerator::new(&config).generate_count(&schema, &query)?;
    println!("  Count:\n    {}\n", count.sql);

    // Step 4: schema evolution
    println!("Step 4: Evolving the schema...");
    let evolved = customer_schema(true)?;
    memo.forget(&evolved.name);
    let plan = synchronizer.synchronize(&evolved, &mut client)?;
    println!("  Added {} columns, dropped {}", plan.add_columns.len(), plan.drop_columns.len());
    let again = synchronizer.synchronize(&evolved, &mut client)?;
    println!("  Second run empty: {}\n", again.is_empty());

    println!("Demo completed!");
    Ok(())
}
