use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;
use structdb::core::config::Config;
use structdb::core::types::{DataTypeFamily, UniqueMode, Value};
use structdb::dac::memory::MemoryClient;
use structdb::schema::schema::StructureSchema;
use structdb::structure::builder::{JsonBodySerializer, StructureBuilder, StructureItem};
use structdb::structure::id::StructureId;
use structdb::sync::synchronizer::{SchemaSynchronizer, SyncMemo};
use structdb::sync::upserter::TableUpserter;
use structdb::writer::bulk::BulkInserter;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Account {
    id: Option<Uuid>,
    email: String,
    score: i64,
}

impl StructureItem for Account {
    fn assign_structure_id(&mut self, id: StructureId) {
        if let StructureId::Guid(g) = id {
            self.id = Some(g);
        }
    }
}

fn schema(unique_email: bool, with_score: bool) -> StructureSchema {
    let mut builder = StructureSchema::builder("Account").guid_id("Id");
    builder = if unique_email {
        builder.unique("Email", DataTypeFamily::String, UniqueMode::PerType)
    } else {
        builder.index("Email", DataTypeFamily::String)
    };
    if with_score {
        builder = builder.index("Score", DataTypeFamily::Integer);
    }
    builder.build().unwrap()
}

fn synchronizer() -> SchemaSynchronizer {
    // A fresh memo forces a real diff on every run
    SchemaSynchronizer::new(&Config::default(), Arc::new(SyncMemo::new()))
}

#[test]
fn second_run_against_unchanged_state_is_empty() {
    let mut client = MemoryClient::new();
    TableUpserter::new(&synchronizer()).upsert(&schema(true, false), &mut client).unwrap();

    let evolved = schema(true, true);
    let first = synchronizer().synchronize(&evolved, &mut client).unwrap();
    assert_eq!(first.add_columns.len(), 1);

    client.clear_log();
    let second = synchronizer().synchronize(&evolved, &mut client).unwrap();
    assert!(second.is_empty());
    assert!(client.executed().is_empty());
}

#[test]
fn drops_and_adds_run_as_one_batch() {
    let mut client = MemoryClient::new();
    TableUpserter::new(&synchronizer()).upsert(&schema(false, true), &mut client).unwrap();
    client.clear_log();

    // Score removed, and Email still present: only a drop
    let plan = synchronizer().synchronize(&schema(false, false), &mut client).unwrap();
    assert_eq!(plan.drop_columns, vec!["Score".to_string()]);
    assert_eq!(client.executed().len(), 1);
    assert_eq!(client.executed()[0].sql, "alter table [AccountIndexes] drop column [Score]");
}

#[test]
fn downgraded_unique_loses_stored_rows_but_keeps_indexes() {
    let config = Config::default();
    let mut client = MemoryClient::new();
    let unique = schema(true, true);
    TableUpserter::new(&synchronizer()).upsert(&unique, &mut client).unwrap();

    let builder = StructureBuilder::new(&unique, &JsonBodySerializer);
    let structures: Vec<_> = ["a@x.org", "b@x.org"]
        .iter()
        .map(|email| {
            let mut account = Account { id: None, email: email.to_string(), score: 1 };
            builder.build(&mut account).unwrap()
        })
        .collect();
    BulkInserter::new(&config).insert(&unique, &structures, &mut client).unwrap();
    assert_eq!(client.rows("AccountUniques").len(), 2);

    let plan = synchronizer().synchronize(&schema(false, true), &mut client).unwrap();

    assert_eq!(plan.obsolete_uniques, vec!["Email".to_string()]);
    assert!(plan.drop_columns.is_empty() && plan.add_columns.is_empty());
    assert!(client.rows("AccountUniques").is_empty());
    assert_eq!(
        client.column_values("AccountStrings", "Value"),
        vec![Value::from("a@x.org"), Value::from("b@x.org")]
    );
}

#[test]
fn shared_memo_synchronizes_once_across_threads() {
    let memo = Arc::new(SyncMemo::new());
    let client = Arc::new(parking_lot::Mutex::new(MemoryClient::new()));
    client.lock().create_table("AccountIndexes", &["StructureId"]);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let memo = memo.clone();
            let client = client.clone();
            std::thread::spawn(move || {
                let sync = SchemaSynchronizer::new(&Config::default(), memo);
                let mut client = client.lock();
                sync.synchronize(&schema(false, true), &mut *client).unwrap()
            })
        })
        .collect();

    let applied: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|plan| !plan.is_empty())
        .count();

    assert_eq!(applied, 1);
    assert!(memo.is_synced("Account"));
    assert_eq!(client.lock().executed().len(), 1);
}
