pub mod core;
pub mod structure;
pub mod schema;
pub mod query;
pub mod parallel;
pub mod dac;
pub mod sync;
pub mod writer;

/*
┌──────────────────────────────────────────────────────────────────────────────────────────────┐
│                                  STRUCTDB ARCHITECTURE                                        │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── WRITE PATH ──────────────────────────────────────────┐
│                                                                                              │
│  item: impl StructureItem                                                                    │
│     │                                                                                        │
│     ▼                                                                                        │
│  ┌─────────────────────────────┐      ┌──────────────────────────────────────────────────┐  │
│  │ ParallelStructureBuilder    │      │ struct Structure                                 │  │
│  │ • pool: rayon::ThreadPool   │─────>│ • id: StructureId (Identity | Guid)              │  │
│  │ • progress: Arc<AtomicUsize>│      │ • body: String          // serialized JSON       │  │
│  │ uses StructureBuilder       │      │ • indexes: Vec<StructureIndex>                   │  │
│  └─────────────────────────────┘      │ • uniques: Vec<StructureIndex>  // ⊆ indexes     │  │
│                                       └──────────────────────────────────────────────────┘  │
│                                                          │                                   │
│                                                          ▼                                   │
│  ┌─────────────────────────────┐      ┌──────────────────────────────────────────────────┐  │
│  │ TableUpserter               │      │ BulkInserter                                     │  │
│  │ • creates missing tables    │      │ • one group per destination table                │  │
│  │ • SchemaSynchronizer        │      │ • 1 row  ──> insert into ... values (@p0, ...)   │  │
│  │   └─ SyncMemo (Arc, shared) │      │ • n rows ──> DbClient::bulk_copy(BulkReader)     │  │
│  └─────────────────────────────┘      └──────────────────────────────────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── QUERY PATH ──────────────────────────────────────────┐
│                                                                                              │
│  "i => i.Int1 == 42"                                                                         │
│     │ query::parser (nom)                                                                    │
│     ▼                                                                                        │
│  Lambda { param, body: Expr } ──WhereParser──> Vec<Node> ──transformers──> Vec<Node>         │
│                                  (folds captured Bindings)   (bool + HasValue completion)    │
│     │                                                                                        │
│     ▼                                                                                        │
│  Query { where_nodes, sortings, includes, take, paging }                                     │
│     │ QueryGenerator (QueryCompiler + Box<dyn SqlDialect>)                                   │
│     ▼                                                                                        │
│  SqlCommand { sql: "... where rs.[Int1] = @p0", params: [@p0 = 42] }   cached by QueryCache  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── PHYSICAL LAYOUT ──────────────────────────────────────┐
│                                                                                              │
│  {Name}Structure   StructureId, Json                                                         │
│  {Name}Uniques     StructureId, UqStructureId, UqMemberPath, UqValue                         │
│  {Name}Integers    StructureId, MemberPath, Value          (also Fractals, Booleans,         │
│                                                             Dates, Guids)                    │
│  {Name}Strings     StructureId, MemberPath, Value, StringValue   (string + enum, and Texts)  │
│  {Name}Indexes     StructureId, one sparse column per index accessor                         │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
