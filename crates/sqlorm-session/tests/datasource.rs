//! Datasource behavior against a recording mock driver.

mod fixtures;

use std::sync::Arc;

use fixtures::mock_types::{MockConnector, Response};
use sqlorm_core::{ConnectParams, Error, TextEncoding, Value};
use sqlorm_query::OrderBy;
use sqlorm_schema::datatypes::{CommonSerial, Integer, Unicode};
use sqlorm_schema::{DbClass, DbObject, Delayed, Field};
use sqlorm_session::{AdapterKind, Datasource, DatasourceConfig, FetchMode};

fn person() -> Arc<DbClass> {
    DbClass::builder("person")
        .field(Field::new("id", CommonSerial))
        .field(Field::new("firstname", Unicode::new()))
        .field(Field::new("lastname", Unicode::new()))
        .field(Field::new("height", Integer))
        .build()
        .unwrap()
}

fn ann(class: &Arc<DbClass>) -> DbObject {
    DbObject::with_values(class, [("firstname", "Ann"), ("lastname", "Lee")]).unwrap()
}

fn pgsql(connector: &MockConnector) -> Datasource {
    Datasource::connect(
        AdapterKind::Pgsql,
        Arc::new(connector.clone()),
        ConnectParams::new().with("db", "hr"),
        DatasourceConfig::new().encoding("utf-8"),
    )
    .unwrap()
}

#[test]
fn test_connect_translates_keywords() {
    let connector = MockConnector::new();
    let _ds = pgsql(&connector);
    let state = connector.state();
    assert_eq!(state.connect_params.len(), 1);
    assert_eq!(state.connect_params[0].get("dbname"), Some("hr"));
    assert!(!state.connect_params[0].contains("db"));
}

#[test]
fn test_insert_reads_back_serial_key() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let person = person();
    connector.rows("SELECT id FROM person", vec![vec![Value::Int(1)]]);

    let obj = ann(&person);
    ds.insert(&obj).unwrap();

    assert_eq!(
        connector.statements(),
        vec![
            "INSERT INTO person(firstname, lastname) VALUES ('Ann', 'Lee')".to_string(),
            "SELECT id FROM person WHERE id = currval('person_id_seq')".to_string(),
        ]
    );
    assert!(obj.is_stored());
    assert_eq!(obj.get("id").unwrap(), Value::Int(1));
}

#[test]
fn test_insert_without_select_skips_read_back() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let obj = ann(&person());

    ds.insert_without_select(&obj).unwrap();

    assert_eq!(connector.statements().len(), 1);
    assert!(obj.is_stored());
    assert_eq!(obj.value_at(0), None);
}

#[test]
fn test_insert_twice_is_rejected() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    connector.rows("SELECT id FROM person", vec![vec![Value::Int(1)]]);
    let obj = ann(&person());
    ds.insert(&obj).unwrap();

    let err = ds.insert(&obj).unwrap_err();
    assert!(matches!(err, Error::ObjectAlreadyInserted(name) if name == "person"));
    assert_eq!(connector.statements().len(), 2);
}

#[test]
fn test_missing_inserted_row() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);

    let err = ds.insert(&ann(&person())).unwrap_err();
    assert!(matches!(err, Error::ObjectWasNotInserted(_)));
}

#[test]
fn test_updates_are_written_at_commit() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let obj = ds.select_for_update(&person(), &[Value::Int(1)]).unwrap();

    obj.set("height", 171).unwrap();
    assert!(connector.statements().is_empty());
    assert_eq!(ds.pending_writes(), 1);

    ds.commit().unwrap();
    assert_eq!(
        connector.statements(),
        vec!["UPDATE person SET height = 171 WHERE id = 1".to_string()]
    );
    assert_eq!(connector.state().commits, 1);
    assert_eq!(ds.pending_writes(), 0);
    assert!(!obj.is_dirty());
}

#[test]
fn test_modifying_statements_flush_first() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let person = person();
    let obj = ds.select_for_update(&person, &[Value::Int(1)]).unwrap();
    obj.set("height", 180).unwrap();

    ds.delete_by_primary_key(&person, &[Value::Int(2)]).unwrap();

    assert_eq!(
        connector.statements(),
        vec![
            "UPDATE person SET height = 180 WHERE id = 1".to_string(),
            "DELETE FROM person WHERE id = 2".to_string(),
        ]
    );
}

#[test]
fn test_duplicate_key_rolls_back() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    connector.script(
        "INSERT",
        Response::Fail(Error::programming(
            "duplicate key value violates unique constraint \"person_pkey\"",
        )),
    );
    let obj = ann(&person());

    let err = ds.insert(&obj).unwrap_err();
    assert!(err.is_duplicate_key());
    assert!(err.sql_text().unwrap().starts_with("INSERT INTO person"));
    assert_eq!(connector.state().rollbacks, 1);
    assert!(!obj.is_stored());
}

#[test]
fn test_other_programming_errors_become_backend_errors() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    connector.script("SELEC", Response::Fail(Error::programming("syntax error")));

    let err = ds.execute_sql("SELEC 1", &[]).unwrap_err();
    assert!(err.is_programming());
    assert!(!err.is_duplicate_key());
    assert_eq!(err.sql_text(), Some("SELEC 1"));
}

#[test]
fn test_reconnect_after_threshold() {
    let connector = MockConnector::new();
    let mut ds = Datasource::connect(
        AdapterKind::Pgsql,
        Arc::new(connector.clone()),
        ConnectParams::new(),
        DatasourceConfig::new().encoding("utf-8").reconnect_threshold(2),
    )
    .unwrap();
    for _ in 0..3 {
        connector.fail_connection("SELECT 1");
    }

    assert!(ds.execute_sql("SELECT 1", &[]).unwrap_err().is_connectivity());
    assert!(ds.execute_sql("SELECT 1", &[]).unwrap_err().is_connectivity());
    assert_eq!(connector.connects(), 1);
    assert_eq!(ds.debug_state().failures, 2);

    assert_eq!(ds.execute_sql("SELECT 1", &[]).unwrap(), 0);
    assert_eq!(connector.connects(), 2);
    assert_eq!(connector.state().closes, 1);
    assert_eq!(ds.debug_state().failures, 0);
}

#[test]
fn test_failed_retry_counts_as_failure() {
    let connector = MockConnector::new();
    let mut ds = Datasource::connect(
        AdapterKind::Pgsql,
        Arc::new(connector.clone()),
        ConnectParams::new(),
        DatasourceConfig::new().encoding("utf-8").reconnect_threshold(0),
    )
    .unwrap();
    connector.fail_connection("SELECT 1");
    connector.fail_connection("SELECT 1");

    assert!(ds.execute_sql("SELECT 1", &[]).unwrap_err().is_connectivity());
    assert_eq!(connector.connects(), 2);
    assert_eq!(ds.debug_state().failures, 1);
}

#[test]
fn test_transaction_state_follows_commit_and_rollback() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    assert!(!ds.in_transaction());

    ds.execute_sql("INSERT INTO t VALUES (1)", &[]).unwrap();
    assert!(ds.in_transaction());
    ds.commit().unwrap();
    assert!(!ds.in_transaction());

    ds.execute_sql("DELETE FROM t", &[]).unwrap();
    assert!(ds.debug_state().in_transaction);
    ds.rollback().unwrap();
    assert!(!ds.in_transaction());
}

#[test]
fn test_no_reconnect_without_connector() {
    let connector = MockConnector::new();
    let mut ds = Datasource::from_connection(
        AdapterKind::Pgsql,
        connector.open(),
        DatasourceConfig::new().encoding("utf-8").reconnect_threshold(0),
    );
    connector.fail_connection("SELECT 1");

    assert!(!ds.ping());
    assert!(ds.ping());
    assert_eq!(connector.connects(), 0);
}

#[test]
fn test_gadfly_preassigns_id() {
    let connector = MockConnector::new();
    let mut ds = Datasource::connect(
        AdapterKind::Gadfly,
        Arc::new(connector.clone()),
        ConnectParams::new(),
        DatasourceConfig::new(),
    )
    .unwrap();
    connector.rows("SELECT COUNT(*) FROM person", vec![vec![Value::Int(2)]]);
    connector.rows("SELECT MAX(id) FROM person", vec![vec![Value::Int(7)]]);
    let obj = ann(&person());

    ds.insert(&obj).unwrap();

    let statements = connector.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements[2].starts_with("INSERT INTO person(id, firstname, lastname) VALUES (8, "));
    assert_eq!(obj.get("id").unwrap(), Value::Int(8));
    assert_eq!(ds.backend_encoding().unwrap(), TextEncoding::Latin1);
    assert_eq!(connector.state().connect_params[0].get("dbname"), Some("tmp"));
}

#[test]
fn test_gadfly_first_id_is_one() {
    let connector = MockConnector::new();
    let mut ds = Datasource::connect(
        AdapterKind::Gadfly,
        Arc::new(connector.clone()),
        ConnectParams::new(),
        DatasourceConfig::new(),
    )
    .unwrap();
    connector.rows("SELECT COUNT(*) FROM person", vec![vec![Value::Int(0)]]);
    let obj = ann(&person());

    ds.insert(&obj).unwrap();
    assert_eq!(obj.get("id").unwrap(), Value::Int(1));
    assert_eq!(connector.statements().len(), 2);
}

#[test]
fn test_select_one_adds_limit() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let person = person();
    connector.rows(
        "SELECT id, firstname",
        vec![vec![
            Value::Int(1),
            Value::from("Ann"),
            Value::from("Lee"),
            Value::Int(180),
        ]],
    );

    let clause = ds.primary_key_where(&person, &[Value::Int(1)]).unwrap();
    let obj = ds.select_one(&person, [clause.into()]).unwrap().unwrap();

    assert_eq!(
        connector.statements(),
        vec!["SELECT id, firstname, lastname, height FROM person WHERE id = 1 LIMIT 1".to_string()]
    );
    assert_eq!(obj.get("firstname").unwrap(), Value::from("Ann"));
    assert!(obj.is_stored());

    obj.set("height", 181).unwrap();
    assert_eq!(ds.pending_writes(), 1);
}

#[test]
fn test_select_yields_every_row() {
    let connector = MockConnector::new();
    let mut ds = Datasource::connect(
        AdapterKind::Pgsql,
        Arc::new(connector.clone()),
        ConnectParams::new(),
        DatasourceConfig::new().encoding("utf-8").fetch_mode(FetchMode::Buffered),
    )
    .unwrap();
    let row = |id: i64, name: &str| vec![Value::Int(id), Value::from(name), Value::Null, Value::Null];
    connector.rows("SELECT", vec![row(1, "Ann"), row(2, "Bob")]);

    let objects: Vec<DbObject> = ds
        .select(&person(), [])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[1].get("firstname").unwrap(), Value::from("Bob"));
}

#[test]
fn test_count_keeps_only_where() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let person = person();
    connector.rows("SELECT COUNT(*)", vec![vec![Value::Int(3)]]);
    let clause = ds.primary_key_where(&person, &[Value::Int(1)]).unwrap();

    let n = ds
        .count(&person, [clause.into(), OrderBy::new(["height"]).into()])
        .unwrap();

    assert_eq!(n, 3);
    assert_eq!(
        connector.statements(),
        vec!["SELECT COUNT(*) FROM person WHERE id = 1".to_string()]
    );
}

#[test]
fn test_delete_all() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    assert_eq!(ds.delete_all(&person()).unwrap(), 1);
    assert_eq!(connector.statements(), vec!["DELETE FROM person".to_string()]);
}

#[test]
fn test_delayed_column_is_loaded_on_demand() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    let class = DbClass::builder("person")
        .field(Field::new("id", Integer))
        .field(Field::new("bio", Delayed::new(Unicode::new())))
        .build()
        .unwrap();
    connector.rows("SELECT bio FROM person", vec![vec![Value::from("Likes SQL")]]);
    let obj = ds.select_for_update(&class, &[Value::Int(4)]).unwrap();

    assert_eq!(ds.load_delayed(&obj, "bio").unwrap(), Value::from("Likes SQL"));
    assert_eq!(
        connector.statements(),
        vec!["SELECT bio FROM person WHERE id = 4".to_string()]
    );
    assert_eq!(obj.value_at(1), None);
}

#[test]
fn test_mysql_encoding_from_character_set() {
    let connector = MockConnector::new();
    connector.state().character_set = Some("LATIN1".to_string());
    let mut ds = Datasource::from_connection(
        AdapterKind::Mysql,
        connector.open(),
        DatasourceConfig::new(),
    );
    assert_eq!(ds.backend_encoding().unwrap(), TextEncoding::Latin1);
}

#[test]
fn test_closed_datasource() {
    let connector = MockConnector::new();
    let mut ds = pgsql(&connector);
    ds.close().unwrap();

    assert!(ds.is_closed());
    assert_eq!(connector.state().closes, 1);
    assert!(matches!(
        ds.query_sql("SELECT 1", &[]),
        Err(Error::DatasourceClosed)
    ));
}

#[test]
fn test_debug_state_serializes() {
    let connector = MockConnector::new();
    let ds = pgsql(&connector);
    let json = serde_json::to_value(ds.debug_state()).unwrap();
    assert_eq!(json["adapter"], "pgsql");
    assert_eq!(json["reconnect_threshold"], 50);
    assert_eq!(json["fetch_mode"], "incremental");
}
