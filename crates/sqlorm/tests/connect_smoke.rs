//! Connection strings dispatched through the facade.

use std::sync::{Arc, Mutex};

use sqlorm::prelude::*;
use sqlorm::{Connection, Cursor};

#[derive(Clone, Default)]
struct RecordingConnector {
    log: Arc<Mutex<Vec<String>>>,
}

impl Connector for RecordingConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>> {
        let keys: Vec<&str> = params.iter().map(|(key, _)| key).collect();
        self.log.lock().unwrap().push(format!("connect {}", keys.join(",")));
        Ok(Box::new(RecordingConnection {
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingConnection {
    log: Arc<Mutex<Vec<String>>>,
}

impl Connection for RecordingConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>> {
        Ok(Box::new(RecordingCursor {
            log: Arc::clone(&self.log),
            rows: Vec::new(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.log.lock().unwrap().push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.log.lock().unwrap().push("rollback".to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Returns id 1 for every SELECT.
struct RecordingCursor {
    log: Arc<Mutex<Vec<String>>>,
    rows: Vec<Row>,
}

impl Cursor for RecordingCursor {
    fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<()> {
        self.log.lock().unwrap().push(sql.to_string());
        if sql.starts_with("SELECT") {
            self.rows = vec![Row::new(vec![Value::Int(1)])];
        }
        Ok(())
    }

    fn fetchone(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop())
    }

    fn fetchall(&mut self) -> Result<Vec<Row>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn rowcount(&self) -> i64 {
        1
    }

    fn description(&self) -> Option<Vec<sqlorm::core::ColumnDescription>> {
        None
    }
}

fn person() -> std::sync::Arc<DbClass> {
    DbClass::builder("person")
        .field(Field::new("id", CommonSerial))
        .field(Field::new("firstname", Unicode::new()))
        .field(Field::new("height", Integer))
        .build()
        .unwrap()
}

#[test]
fn test_single_datasource_round_trip() {
    let connector = RecordingConnector::default();
    let source = connect("adapter=mysql db=hr user=ann", Arc::new(connector.clone())).unwrap();
    assert!(!source.is_pooled());
    assert_eq!(source.adapter(), AdapterKind::Mysql);
    let mut ds = source.into_datasource().unwrap();

    let person = person();
    let ann = DbObject::with_values(&person, [("firstname", "Ann")]).unwrap();
    ds.insert(&ann).unwrap();
    assert_eq!(ann.get("id").unwrap(), Value::Int(1));

    ann.set("height", 171).unwrap();
    ds.commit().unwrap();

    let log = connector.log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            "connect charset,db,host,port,user".to_string(),
            "INSERT INTO person(firstname) VALUES ('Ann')".to_string(),
            "SELECT id FROM person WHERE id = LAST_INSERT_ID()".to_string(),
            "UPDATE person SET height = 171 WHERE id = 1".to_string(),
            "commit".to_string(),
        ]
    );
}

#[test]
fn test_pool_keyword_selects_pool() {
    let connector = RecordingConnector::default();
    let mut source = connect("adapter=pgsql db=hr pool=1,2", Arc::new(connector)).unwrap();
    assert!(source.is_pooled());

    let err = source
        .with_datasource(|_| -> Result<()> { Err(Error::Pool("stop".to_string())) })
        .unwrap_err();
    assert!(matches!(err, Error::Pool(_)));

    let pool = source.into_pool().unwrap();
    assert_eq!(pool.config(), PoolConfig { min: 1, max: 2 });
}

#[test]
fn test_pool_refused_for_mysql() {
    let err = connect("adapter=mysql pool=1,2", Arc::new(RecordingConnector::default())).unwrap_err();
    assert!(matches!(err, Error::NoPoolForAdapter(_)));
}

#[test]
fn test_bad_connection_strings() {
    let connector: Arc<dyn Connector> = Arc::new(RecordingConnector::default());
    assert!(matches!(
        connect("db=hr", Arc::clone(&connector)),
        Err(Error::IllegalConnectionString(_))
    ));
    assert!(matches!(
        connect("adapter=sybase", connector),
        Err(Error::UnknownAdapter(_))
    ));
}
