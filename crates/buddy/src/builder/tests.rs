use super::*;
use crate::dialect::{DefaultDialect, H2Dialect, PostgresDialect};
use crate::executor::{ColumnType, NoCopy};
use crate::expr::{Expression, concat, count};
use crate::metadata::{Constructor, Entity, EntityDescriptor, FieldDescriptor, TableInfo};
use crate::value::FromValue;
use std::sync::Mutex;

#[derive(Debug, PartialEq)]
struct Person {
    id: Option<i64>,
    name: String,
    age: i32,
}

impl Entity for Person {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Person")
            .field(FieldDescriptor::of::<Option<i64>>("id").id().generated())
            .field(FieldDescriptor::of::<String>("name"))
            .field(FieldDescriptor::of::<i32>("age"))
    }

    fn constructor() -> Constructor<Self> {
        Constructor::AllArgs(|values| {
            let [id, name, age]: [Value; 3] = values
                .try_into()
                .map_err(|_| BuddyError::Mapping("person takes three values".into()))?;
            Ok(Person {
                id: FromValue::from_value("id", id)?,
                name: FromValue::from_value("name", name)?,
                age: FromValue::from_value("age", age)?,
            })
        })
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "age" => Some(self.age.into()),
            _ => None,
        }
    }
}

impl FromRecord for Person {
    fn from_record(record: Record) -> BuddyResult<Self> {
        record.to_entity()
    }
}

struct Pet;

impl Entity for Pet {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Pet")
            .field(FieldDescriptor::of::<i64>("id").id())
            .field(FieldDescriptor::of::<i64>("ownerId"))
            .field(FieldDescriptor::of::<String>("name"))
    }

    fn field_value(&self, _field: &str) -> Option<Value> {
        None
    }
}

struct Tag;

impl Entity for Tag {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Tag").field(FieldDescriptor::of::<String>("label"))
    }

    fn field_value(&self, _field: &str) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone)]
struct MockRow(Vec<(&'static str, ColumnType, Value)>);

impl RawRow for MockRow {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn column_name(&self, index: usize) -> &str {
        self.0[index].0
    }

    fn column_type(&self, index: usize) -> ColumnType {
        self.0[index].1
    }

    fn value(&self, index: usize) -> BuddyResult<Value> {
        Ok(self.0[index].2.clone())
    }
}

/// Returns the same canned rows for every query and records every call.
#[derive(Default)]
struct MockExecutor {
    rows: Vec<MockRow>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    key_columns: Mutex<Vec<String>>,
}

impl MockExecutor {
    fn returning(rows: Vec<MockRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }

    fn last_sql(&self) -> String {
        self.calls.lock().unwrap().last().unwrap().0.clone()
    }
}

impl SqlExecutor for MockExecutor {
    type Row = MockRow;
    type Sink = NoCopy;

    fn product_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> BuddyResult<u64> {
        self.record(sql, params);
        Ok(self.rows.len() as u64)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> BuddyResult<Vec<MockRow>> {
        self.record(sql, params);
        Ok(self.rows.clone())
    }

    async fn execute_returning_keys(
        &self,
        sql: &str,
        params: &[Value],
        columns: &[String],
    ) -> BuddyResult<Vec<MockRow>> {
        self.record(sql, params);
        self.key_columns.lock().unwrap().extend_from_slice(columns);
        Ok(self.rows.clone())
    }
}

fn person_row(id: i64, name: &str, age: i32) -> MockRow {
    MockRow(vec![
        ("ID", ColumnType::BigInt, Value::BigInt(id)),
        ("NAME", ColumnType::Text, Value::from(name)),
        ("AGE", ColumnType::Int, Value::Int(age)),
    ])
}

fn ctx(dialect: Arc<dyn Dialect>) -> Context {
    Context::with_dialect(dialect)
}

fn person(ctx: &Context, alias: &str) -> TableInfo<Person> {
    ctx.introspector().table::<Person>().with_alias(alias)
}

fn pet(ctx: &Context, alias: &str) -> TableInfo<Pet> {
    ctx.introspector().table::<Pet>().with_alias(alias)
}

fn message(err: BuddyError) -> String {
    assert!(err.is_builder(), "expected builder error, got {err:?}");
    err.to_string()
}

// ---------- select ----------

#[test]
fn select_defaults_to_root_asterisk() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let select = Select::<Record>::new(ctx, vec![]).from(&p).unwrap();
    assert_eq!(select.to_sql().unwrap(), "SELECT p.* FROM person p");
    assert!(select.collect_parameters().is_empty());
}

#[test]
fn select_renders_every_clause_in_order() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let name = p.column("name").unwrap();
    let age = p.column("age").unwrap();

    let select = Select::<Record>::new(ctx, vec![name.to_expr(), count().alias("n")])
        .from(&p)
        .unwrap()
        .where_(age.clone().greater_than(18))
        .unwrap()
        .where_(name.clone().like("A%"))
        .unwrap()
        .group_by([name.clone()])
        .unwrap()
        .having(count().greater_than(1))
        .unwrap()
        .order_by(name.asc())
        .unwrap()
        .limit(10)
        .unwrap()
        .offset(20)
        .unwrap();

    assert_eq!(
        select.to_sql().unwrap(),
        "SELECT p.name, count(*) AS n FROM person p WHERE p.age > ? and p.name like ? \
         GROUP BY p.name HAVING count(*) > ? ORDER BY p.name ASC NULLS LAST LIMIT 10 OFFSET 20"
    );
    assert_eq!(
        select.collect_parameters(),
        vec![Value::Int(18), Value::from("A%"), Value::Int(1)]
    );
}

#[test]
fn select_joins_collect_on_parameters_before_where() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let d = pet(&ctx, "d");
    let owner = d.column("ownerId").unwrap();

    let select = Select::<Record>::new(ctx, vec![])
        .from(&p)
        .unwrap()
        .join(&d, owner.clone().eq(p.id_column().unwrap()).and(d.column("name").unwrap().eq("rex")))
        .unwrap()
        .join_on_id(JoinKind::Left, &d.with_alias("e"), &d.with_alias("e").column("ownerId").unwrap())
        .unwrap()
        .where_(p.column("age").unwrap().eq(3))
        .unwrap();

    assert_eq!(
        select.to_sql().unwrap(),
        "SELECT p.* FROM person p JOIN pet d ON d.owner_id = p.id and d.name = ? \
         LEFT JOIN pet e ON p.id = e.owner_id WHERE p.age = ?"
    );
    assert_eq!(
        select.collect_parameters(),
        vec![Value::from("rex"), Value::Int(3)]
    );
}

#[test]
fn select_rejects_out_of_order_clauses() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let age = p.column("age").unwrap();
    let base = || Select::<Record>::new(ctx.clone(), vec![]);

    let err = base().where_(age.clone().eq(1)).unwrap_err();
    assert_eq!(message(err), "Select requires a FROM clause before WHERE");

    let err = base().from(&p).unwrap().from(&p).unwrap_err();
    assert_eq!(message(err), "FROM clause has already been specified");

    let err = base()
        .from(&p)
        .unwrap()
        .order_by(age.clone().asc())
        .unwrap()
        .where_(age.clone().eq(1))
        .unwrap_err();
    assert_eq!(message(err), "Cannot use WHERE after ORDER BY");

    let err = base().from(&p).unwrap().limit(1).unwrap().limit(2).unwrap_err();
    assert_eq!(message(err), "Cannot use LIMIT after LIMIT");

    let err = base().from(&p).unwrap().offset(1).unwrap().limit(2).unwrap_err();
    assert_eq!(message(err), "Cannot use LIMIT after OFFSET");

    let err = base().to_sql().unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn join_on_id_requires_an_id_column() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let tags = ctx.introspector().table::<Tag>().with_alias("t");
    let p = person(&ctx, "p");
    let err = Select::<Record>::new(ctx, vec![])
        .from(&tags)
        .unwrap()
        .join_on_id(JoinKind::Inner, &p, &p.column("name").unwrap())
        .unwrap_err();
    assert!(matches!(err, BuddyError::MissingId(_)));
}

// ---------- insert ----------

#[test]
fn insert_with_set_renders_single_row() {
    let ctx = ctx(Arc::new(PostgresDialect));
    let p = person(&ctx, "p");
    let insert = Insert::new(ctx, p.clone())
        .set(&p.column("name").unwrap(), "Ann")
        .unwrap()
        .set(&p.column("age").unwrap(), 30)
        .unwrap()
        .returning_fields([p.id_column().unwrap()]);

    assert_eq!(
        insert.to_sql().unwrap(),
        "INSERT INTO person (name, age) VALUES (?, ?) RETURNING id"
    );
    assert_eq!(
        insert.collect_parameters(),
        vec![Value::from("Ann"), Value::Int(30)]
    );
}

#[test]
fn insert_multi_row_and_conflict() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let insert = Insert::new(ctx, p.clone())
        .columns([p.column("name").unwrap(), p.column("age").unwrap()])
        .unwrap()
        .values([Value::from("Ann"), Value::Int(30)])
        .unwrap()
        .values([Value::from("Bob"), Value::Int(40)])
        .unwrap()
        .on_conflict_do_nothing();

    assert_eq!(
        insert.to_sql().unwrap(),
        "INSERT INTO person (name, age) VALUES (?, ?), (?, ?) ON CONFLICT DO NOTHING"
    );
    assert_eq!(insert.collect_parameters().len(), 4);
}

#[test]
fn insert_from_select_appends_select_parameters() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let q = person(&ctx, "q");
    let source = Select::<Record>::new(
        ctx.clone(),
        vec![q.column("name").unwrap().to_expr(), q.column("age").unwrap().to_expr()],
    )
    .from(&q)
    .unwrap()
    .where_(q.column("age").unwrap().less_than(5))
    .unwrap();

    let insert = Insert::new(ctx, p.clone())
        .columns([p.column("name").unwrap(), p.column("age").unwrap()])
        .unwrap()
        .select(&source)
        .unwrap();

    assert_eq!(
        insert.to_sql().unwrap(),
        "INSERT INTO person (name, age) SELECT q.name, q.age FROM person q WHERE q.age < ?"
    );
    assert_eq!(insert.collect_parameters(), vec![Value::Int(5)]);
}

#[test]
fn insert_json_placeholders_follow_the_dialect() {
    struct Doc;
    impl Entity for Doc {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("Doc").field(FieldDescriptor::of::<serde_json::Value>("body"))
        }
        fn field_value(&self, _field: &str) -> Option<Value> {
            None
        }
    }

    for (dialect, expected) in [
        (Arc::new(PostgresDialect) as Arc<dyn Dialect>, "INSERT INTO doc (body) VALUES (?::jsonb)"),
        (Arc::new(H2Dialect), "INSERT INTO doc (body) VALUES (? FORMAT JSON)"),
        (Arc::new(DefaultDialect), "INSERT INTO doc (body) VALUES (?)"),
    ] {
        let ctx = ctx(dialect);
        let doc = ctx.introspector().table::<Doc>();
        let insert = Insert::new(ctx, doc.clone())
            .set(&doc.column("body").unwrap(), serde_json::json!({"a": 1}))
            .unwrap();
        assert_eq!(insert.to_sql().unwrap(), expected);
    }
}

#[test]
fn insert_rejects_mixed_sources() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let name = p.column("name").unwrap();
    let age = p.column("age").unwrap();
    let fresh = || Insert::new(ctx.clone(), p.clone());
    let source = Select::<Record>::new(ctx.clone(), vec![]).from(&p).unwrap();

    let err = fresh().set(&name, "a").unwrap().set(&name, "b").unwrap_err();
    assert_eq!(message(err), "Cannot set same field multiple times");

    let err = fresh().columns([name.clone()]).unwrap().set(&age, 1).unwrap_err();
    assert_eq!(message(err), "Cannot use set after calling columns");

    let err = fresh()
        .columns([name.clone()])
        .unwrap()
        .values(["a"])
        .unwrap()
        .set(&age, 1)
        .unwrap_err();
    assert_eq!(message(err), "Cannot use set method when using multiple records");

    let err = fresh().columns([name.clone()]).unwrap().select(&source).unwrap().set(&age, 1).unwrap_err();
    assert_eq!(message(err), "Cannot use set method when using select insert");

    let err = fresh().set(&name, "a").unwrap().columns([age.clone()]).unwrap_err();
    assert_eq!(
        message(err),
        "Columns are specified automatically when you use set(Field, value)"
    );

    let err = fresh().set(&name, "a").unwrap().values(["b"]).unwrap_err();
    assert_eq!(message(err), "Cannot mix and match set(Field, value) with values");

    let err = fresh().columns([name.clone()]).unwrap().values(["a", "b"]).unwrap_err();
    assert_eq!(message(err), "Specified values don't match the number of columns");

    let err = fresh().columns([name.clone()]).unwrap().select(&source).unwrap().values(["a"]).unwrap_err();
    assert_eq!(message(err), "Cannot specify values when using select insert");

    let err = fresh().set(&name, "a").unwrap().select(&source).unwrap_err();
    assert_eq!(message(err), "Cannot use select after you've used values method");

    let err = fresh().columns([name.clone()]).unwrap().values(["a"]).unwrap().select(&source).unwrap_err();
    assert_eq!(message(err), "Cannot use select after you've used set method");

    assert_eq!(
        message(fresh().to_sql().unwrap_err()),
        "You need to defined at least one column to insert"
    );
    assert_eq!(
        message(fresh().columns([name.clone()]).unwrap().to_sql().unwrap_err()),
        "Missing values to insert"
    );
}

#[tokio::test]
async fn insert_fetch_requires_returning() {
    let ctx = ctx(Arc::new(PostgresDialect));
    let p = person(&ctx, "p");
    let insert = Insert::new(ctx, p.clone()).set(&p.column("name").unwrap(), "Ann").unwrap();
    let err = insert.fetch(&MockExecutor::default()).await.unwrap_err();
    assert_eq!(message(err), "Fetch is only allowed when using returning");
}

#[tokio::test]
async fn insert_returning_uses_the_statement_on_postgres() {
    let ctx = ctx(Arc::new(PostgresDialect));
    let p = person(&ctx, "p");
    let db = MockExecutor::returning(vec![person_row(7, "Ann", 30)]);
    let insert = Insert::new(ctx, p.clone())
        .set(&p.column("name").unwrap(), "Ann")
        .unwrap()
        .set(&p.column("age").unwrap(), 30)
        .unwrap()
        .returning();

    let saved = insert.fetch_single_into(&db).await.unwrap();
    assert_eq!(
        saved,
        Person {
            id: Some(7),
            name: "Ann".into(),
            age: 30
        }
    );
    assert_eq!(
        db.last_sql(),
        "INSERT INTO person (name, age) VALUES (?, ?) RETURNING *"
    );
    assert!(db.key_columns.lock().unwrap().is_empty());
}

#[tokio::test]
async fn insert_returning_falls_back_to_generated_keys() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let db = MockExecutor::returning(vec![MockRow(vec![("id", ColumnType::BigInt, Value::BigInt(9))])]);
    let insert = Insert::new(ctx, p.clone())
        .set(&p.column("name").unwrap(), "Ann")
        .unwrap()
        .returning();

    let record = insert.fetch_single(&db).await.unwrap();
    assert_eq!(record.get("id"), Some(&Value::BigInt(9)));
    assert_eq!(db.last_sql(), "INSERT INTO person (name) VALUES (?)");
    assert_eq!(*db.key_columns.lock().unwrap(), vec!["id".to_string()]);
}

// ---------- update / delete ----------

#[test]
fn update_renders_set_then_where() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let update = Update::new(ctx, p.clone())
        .set(&p.column("name").unwrap(), "Ann")
        .unwrap()
        .set(&p.column("age").unwrap(), 31)
        .unwrap()
        .where_(p.id_column().unwrap().eq(7i64))
        .where_(p.column("age").unwrap().is_not_null());

    assert_eq!(
        update.to_sql().unwrap(),
        "UPDATE person p SET name=?, age=? WHERE p.id = ? AND p.age is not null"
    );
    assert_eq!(
        update.collect_parameters(),
        vec![Value::from("Ann"), Value::Int(31), Value::BigInt(7)]
    );
}

#[test]
fn update_checks() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let empty = Update::new(ctx.clone(), p.clone());
    assert_eq!(
        message(empty.to_sql().unwrap_err()),
        "You need to specify at least one column to update"
    );

    let err = Update::new(ctx, p.clone())
        .where_(p.id_column().unwrap().eq(1i64))
        .set(&p.column("age").unwrap(), 2)
        .unwrap_err();
    assert_eq!(message(err), "Cannot use set after where");
}

#[test]
fn delete_with_and_without_conditions() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let all = Delete::new(ctx.clone(), p.clone());
    assert_eq!(all.to_sql().unwrap(), "DELETE FROM person p");

    let some = Delete::new(ctx, p.clone())
        .where_(p.column("age").unwrap().in_list([1, 2]))
        .where_(p.column("name").unwrap().eq("x"));
    assert_eq!(
        some.to_sql().unwrap(),
        "DELETE FROM person p WHERE p.age in (?, ?) AND p.name = ?"
    );
    assert_eq!(
        some.collect_parameters(),
        vec![Value::Int(1), Value::Int(2), Value::from("x")]
    );
}

#[test]
fn placeholder_count_matches_parameters() {
    let ctx = ctx(Arc::new(PostgresDialect));
    let p = person(&ctx, "p");
    let q = person(&ctx, "q");
    let d = pet(&ctx, "d");
    let name = p.column("name").unwrap();
    let age = p.column("age").unwrap();

    let joined = Select::<Record>::new(ctx.clone(), vec![concat(&name, "!").alias("shout"), count()])
        .from(&p)
        .unwrap()
        .join(&d, d.column("ownerId").unwrap().eq(p.id_column().unwrap()).and(d.column("name").unwrap().like("r%")))
        .unwrap()
        .where_(age.clone().in_list([1, 2, 3]).or(age.clone().between(10, 20)))
        .unwrap()
        .where_(name.clone().not_in(["x", "y"]))
        .unwrap()
        .where_(age.clone().in_list(Vec::<i32>::new()))
        .unwrap()
        .group_by([name.clone()])
        .unwrap()
        .having(count().greater_than(1).and(count().less_than(9)))
        .unwrap();

    let source = Select::<Record>::new(
        ctx.clone(),
        vec![concat(q.column("name").unwrap(), "?"), q.column("age").unwrap().to_expr()],
    )
    .from(&q)
    .unwrap()
    .where_(q.column("age").unwrap().not_between(5, 6))
    .unwrap();
    let copied = Insert::new(ctx.clone(), p.clone())
        .columns([name.clone(), age.clone()])
        .unwrap()
        .select(&source)
        .unwrap();

    let mut rows = Insert::new(ctx.clone(), p.clone()).columns([name.clone(), age.clone()]).unwrap();
    for (who, years) in [("Ann", 30), ("Bob", 40), ("Cid", 50)] {
        rows = rows.values([Value::from(who), Value::Int(years)]).unwrap();
    }

    let update = Update::new(ctx.clone(), p.clone())
        .set(&name, "Ann")
        .unwrap()
        .set(&age, 31)
        .unwrap()
        .where_(age.clone().in_list([1, 2]).or(name.clone().is_null()));

    let delete = Delete::new(ctx, p.clone()).where_(!age.clone().between(1, 2));

    let statements = [
        (joined.to_sql().unwrap(), joined.collect_parameters()),
        (copied.to_sql().unwrap(), copied.collect_parameters()),
        (rows.to_sql().unwrap(), rows.collect_parameters()),
        (update.to_sql().unwrap(), update.collect_parameters()),
        (delete.to_sql().unwrap(), delete.collect_parameters()),
    ];
    for (sql, params) in statements {
        assert_eq!(sql.matches('?').count(), params.len(), "{sql}");
    }
}

// ---------- fetch family ----------

fn people_select(ctx: Context) -> Select<Person> {
    let p = person(&ctx, "p");
    Select::new(ctx, vec![]).from(&p).unwrap()
}

#[tokio::test]
async fn fetch_single_enforces_cardinality() {
    let ctx = ctx(Arc::new(DefaultDialect));

    let none = MockExecutor::default();
    let err = people_select(ctx.clone()).fetch_single(&none).await.unwrap_err();
    assert!(err.is_no_data_found());

    let two = MockExecutor::returning(vec![person_row(1, "a", 1), person_row(2, "b", 2)]);
    let err = people_select(ctx.clone()).fetch_single(&two).await.unwrap_err();
    assert!(err.is_too_many_rows());

    let first = people_select(ctx).fetch_one_into(&two).await.unwrap();
    assert_eq!(first.map(|p| p.name), Some("a".to_string()));
}

#[tokio::test]
async fn fetch_into_maps_every_row() {
    let ctx = Context::new(
        Arc::new(DefaultDialect),
        Arc::new(crate::metadata::Introspector::new()),
        Arc::new(DatabaseConfig::default().buffered()),
    );
    let db = MockExecutor::returning(vec![person_row(1, "a", 10), person_row(2, "b", 20)]);
    let people = people_select(ctx).fetch_into(&db).await.unwrap().to_list().await.unwrap();
    let ages: Vec<i32> = people.iter().map(|p| p.age).collect();
    assert_eq!(ages, [10, 20]);

    let sql = db.last_sql();
    assert!(sql.starts_with("SELECT p.* FROM person p"), "{sql}");
}

#[tokio::test]
async fn fetch_into_as_scalar() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let db = MockExecutor::returning(vec![MockRow(vec![("count", ColumnType::BigInt, Value::BigInt(3))])]);
    let select = Select::<Record>::new(ctx, vec![count()]).from(&p).unwrap();
    let n = select.fetch_into_as::<i32, _>(&db).await.unwrap().to_list().await.unwrap();
    assert_eq!(n, [3]);
}

#[tokio::test]
async fn execute_reports_affected_rows() {
    let ctx = ctx(Arc::new(DefaultDialect));
    let p = person(&ctx, "p");
    let db = MockExecutor::returning(vec![person_row(1, "a", 1), person_row(2, "b", 2)]);
    let affected = Delete::new(ctx, p).execute(&db).await.unwrap();
    assert_eq!(affected, 2);
    assert_eq!(db.calls.lock().unwrap().len(), 1);
}
