use std::sync::Arc;
use structdb::core::config::Config;
use structdb::core::error::ErrorKind;
use structdb::core::types::{DataTypeFamily, Value};
use structdb::query::cache::QueryCache;
use structdb::query::dialect::DialectKind;
use structdb::query::generator::{QueryGenerator, QueryShape};
use structdb::query::query::QueryBuilder;
use structdb::schema::naming::DefaultNameTranslator;
use structdb::schema::schema::StructureSchema;
use structdb::structure::index::to_composite;

fn schema() -> StructureSchema {
    StructureSchema::builder("Item")
        .guid_id("StructureId")
        .index("Int1", DataTypeFamily::Integer)
        .index("String1", DataTypeFamily::String)
        .index("Bool1", DataTypeFamily::Boolean)
        .index("Bool2", DataTypeFamily::Boolean)
        .enumerable("Tags", DataTypeFamily::String)
        .index("Customer.Address.PostalCodeOfTheDeliveryDestination", DataTypeFamily::String)
        .index("CustomerId", DataTypeFamily::Guid)
        .build()
        .unwrap()
}

fn generate(expression: &str) -> structdb::query::command::SqlCommand {
    let schema = schema();
    let query = QueryBuilder::new(&schema).filter(expression).unwrap().build();
    QueryGenerator::new(&Config::default()).generate(&schema, &query).unwrap()
}

#[test]
fn equality_uses_one_positional_parameter() {
    let command = generate("i => i.Int1 == 42");
    assert!(command.sql.ends_with("[Int1] = @p0"), "{}", command.sql);
    assert_eq!(command.params.len(), 1);
    assert_eq!(command.params[0].name, "@p0");
    assert_eq!(command.params[0].value, Value::Integer(42));
}

#[test]
fn inequality_uses_angle_brackets() {
    let command = generate("i => i.Int1 != 42");
    assert!(command.sql.ends_with("[Int1] <> @p0"), "{}", command.sql);
    assert_eq!(command.param("@p0"), Some(&Value::Integer(42)));
}

#[test]
fn null_comparisons_take_no_parameters() {
    let is_null = generate("i => i.String1 == null");
    assert!(is_null.sql.ends_with("[String1] is null"), "{}", is_null.sql);
    assert!(is_null.params.is_empty());

    let not_null = generate("i => i.String1 != null");
    assert!(not_null.sql.ends_with("[String1] is not null"), "{}", not_null.sql);
    assert!(not_null.params.is_empty());
}

#[test]
fn bare_boolean_member_equals_explicit_true() {
    let bare = generate("i => i.Bool1");
    let explicit = generate("i => i.Bool1 == true");
    assert_eq!(bare, explicit);
    assert_eq!(bare.param("@p0"), Some(&Value::Boolean(true)));
}

#[test]
fn constants_on_the_left_are_swapped() {
    let command = generate("i => 10 < i.Int1");
    assert!(command.sql.ends_with("[Int1] > @p0"), "{}", command.sql);
}

#[test]
fn identity_member_targets_structure_id() {
    let schema = schema();
    let id = uuid::Uuid::now_v7();
    let query = QueryBuilder::new(&schema)
        .bind("id", id)
        .filter("i => i.StructureId == id")
        .unwrap()
        .build();
    let command = QueryGenerator::new(&Config::default()).generate(&schema, &query).unwrap();

    assert_eq!(
        command.sql,
        "select rs.[StructureId], rs.[Json] from [ItemStructure] rs where rs.[StructureId] = @p0"
    );
    assert_eq!(command.param("@p0"), Some(&Value::Guid(id)));
}

#[test]
fn unsupported_shapes_are_parse_errors() {
    let schema = schema();
    let err = QueryBuilder::new(&schema).filter("i => i.Int1.Foo(1)").err().unwrap();
    assert!(err.is(ErrorKind::UnsupportedExpression));
}

#[test]
fn dialects_share_the_ordering_clause() {
    let schema = schema();
    let query = QueryBuilder::new(&schema)
        .filter("i => i.Int1 > 0")
        .unwrap()
        .order_by_desc("i => i.String1")
        .unwrap()
        .page(3, 25)
        .unwrap()
        .build();

    let row_number = QueryGenerator::new(&Config::default().with_dialect(DialectKind::RowNumber))
        .generate(&schema, &query)
        .unwrap();
    let offset_fetch = QueryGenerator::new(&Config::default().with_dialect(DialectKind::OffsetFetch))
        .generate(&schema, &query)
        .unwrap();

    let ordering = "order by rs.[String1] desc";
    assert!(row_number.sql.contains("row_number() over (order by rs.[String1] desc)"));
    assert!(offset_fetch.sql.contains(ordering));
    // Filter parameter first, then the page bounds
    assert_eq!(row_number.params.len(), 3);
    assert_eq!(offset_fetch.params.len(), 3);
    assert_eq!(row_number.params[1].value, Value::Integer(76));
    assert_eq!(offset_fetch.params[1].value, Value::Integer(75));
}

#[test]
fn over_length_aliases_are_bounded() {
    let schema = schema();
    let query = QueryBuilder::new(&schema)
        .filter("i => i.Customer.Address.PostalCodeOfTheDeliveryDestination == \"0150\"")
        .unwrap()
        .build();
    let generator = QueryGenerator::new(&Config::default())
        .with_translator(Arc::new(DefaultNameTranslator::new(20)));
    let command = generator.generate(&schema, &query).unwrap();

    let alias_start = command.sql.rfind("rs.[").unwrap() + 4;
    let alias_end = alias_start + command.sql[alias_start..].find(']').unwrap();
    assert!(alias_end - alias_start <= 20);
    assert!(!command.sql.contains("Customer_Address_PostalCodeOfTheDeliveryDestination"));
}

#[test]
fn includes_and_every_shape_compile() {
    let schema = schema();
    let query = QueryBuilder::new(&schema)
        .filter("i => i.String1.StartsWith(\"ab\")")
        .unwrap()
        .include("Customer", "i => i.CustomerId")
        .unwrap()
        .build();
    let generator = QueryGenerator::new(&Config::default());

    let full = generator.generate(&schema, &query).unwrap();
    assert!(full.sql.contains("left join [CustomerStructure] inc0"));
    assert_eq!(full.param("@p0"), Some(&Value::from("ab%")));

    let ids = generator.generate_ids(&schema, &query).unwrap();
    assert!(ids.sql.starts_with("select rs.[StructureId] from"));
    assert!(!ids.sql.contains("inc0"));

    assert!(generator.generate_count(&schema, &query).unwrap().sql.starts_with("select count(*)"));
    assert!(generator.generate_exists(&schema, &query).unwrap().sql.contains("exists (select 1"));
}

#[test]
fn cached_commands_are_identical() {
    let schema = schema();
    let generator = QueryGenerator::new(&Config::default());
    let cache = QueryCache::new(Config::default().query_cache_size);
    let query = QueryBuilder::new(&schema).filter("i => i.Int1 == 1").unwrap().build();

    let first = cache.get_or_generate(&generator, &schema, &query, QueryShape::Full).unwrap();
    let second = cache.get_or_generate(&generator, &schema, &query, QueryShape::Full).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.stats().hit_count, 1);
}

#[test]
fn any_not_equal_matches_collections_holding_another_element() {
    let command = generate("i => i.Tags.Any(t => t != \"x\")");
    assert!(
        command.sql.ends_with("where ((rs.[Tags] is not null) and (rs.[Tags] <> @p0))"),
        "{}",
        command.sql
    );
    let differs_from = command.param("@p0").unwrap();

    // Stored composites the filter is evaluated against
    let x_and_y = to_composite(&[Value::from("x"), Value::from("y")]);
    let only_x = to_composite(&[Value::from("x"), Value::from("x")]);
    assert!(!x_and_y.is_null() && &x_and_y != differs_from);
    assert_eq!(&only_x, differs_from);
}

#[test]
fn member_to_member_boolean_comparison_has_no_literal() {
    let command = generate("i => i.Bool1 == i.Bool2");
    assert!(command.sql.ends_with("where rs.[Bool1] = rs.[Bool2]"), "{}", command.sql);
    assert!(command.params.is_empty());
}

#[test]
fn unknown_functions_are_unsupported() {
    let schema = schema();
    let err = QueryBuilder::new(&schema).filter("i => i.Int1 == unknown_fn(1)").err().unwrap();
    assert!(err.is(ErrorKind::UnsupportedExpression));
}

#[test]
fn negating_the_smallest_bound_integer_is_an_error() {
    let schema = schema();
    let err = QueryBuilder::new(&schema)
        .bind("n", i64::MIN)
        .filter("i => i.Int1 == -n")
        .err()
        .unwrap();
    assert!(err.is(ErrorKind::Parse));
}

#[test]
fn pages_past_the_last_row_are_rejected() {
    let schema = schema();
    let err = QueryBuilder::new(&schema).page(usize::MAX / 2, 4).err().unwrap();
    assert!(err.is(ErrorKind::InvalidArgument));
}

#[test]
fn both_dialects_return_the_same_columns() {
    let schema = schema();
    let query = QueryBuilder::new(&schema)
        .include("Customer", "i => i.CustomerId")
        .unwrap()
        .page(0, 10)
        .unwrap()
        .build();

    let row_number = QueryGenerator::new(&Config::default().with_dialect(DialectKind::RowNumber))
        .generate(&schema, &query)
        .unwrap();
    assert!(
        row_number.sql.starts_with("select pg.[StructureId], pg.[Json], pg.[IncludeJson0] from (select"),
        "{}",
        row_number.sql
    );
    assert!(!row_number.sql.contains("pg.*"));

    let offset_fetch = QueryGenerator::new(&Config::default().with_dialect(DialectKind::OffsetFetch))
        .generate(&schema, &query)
        .unwrap();
    assert!(offset_fetch.sql.starts_with("select rs.[StructureId], rs.[Json], inc0.[Json] as [IncludeJson0] from"));
}

#[test]
fn cache_keeps_dialects_apart() {
    let schema = schema();
    let cache = QueryCache::new(Config::default().query_cache_size);
    let query = QueryBuilder::new(&schema).page(2, 5).unwrap().build();
    let offset_fetch = QueryGenerator::new(&Config::default().with_dialect(DialectKind::OffsetFetch));
    let row_number = QueryGenerator::new(&Config::default().with_dialect(DialectKind::RowNumber));

    let native = cache.get_or_generate(&offset_fetch, &schema, &query, QueryShape::Full).unwrap();
    let windowed = cache.get_or_generate(&row_number, &schema, &query, QueryShape::Full).unwrap();

    assert_eq!(native, offset_fetch.generate(&schema, &query).unwrap());
    assert_eq!(windowed, row_number.generate(&schema, &query).unwrap());
    assert_eq!(cache.stats().hit_count, 0);
}
