//! Mock driver recording every statement it is handed.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use sqlorm_core::{
    ColumnDescription, ConnectParams, Connection, ConnectionErrorKind, Connector, Cursor, Error,
    Result, Row, Value,
};

/// What the mock answers to a statement.
pub enum Response {
    Rows(Vec<Row>),
    Count(i64),
    Fail(Error),
}

/// State shared by a connector and every connection it opened.
#[derive(Default)]
pub struct MockState {
    pub statements: Vec<(String, Vec<Value>)>,
    /// One-shot answers, matched by statement prefix
    pub scripts: Vec<(String, Response)>,
    pub connect_params: Vec<ConnectParams>,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
    pub character_set: Option<String>,
}

impl MockState {
    fn answer(&mut self, sql: &str) -> Option<Response> {
        let pos = self.scripts.iter().position(|(prefix, _)| sql.starts_with(prefix))?;
        Some(self.scripts.remove(pos).1)
    }
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Answer the next statement starting with `prefix` with `response`.
    pub fn script(&self, prefix: &str, response: Response) {
        self.state().scripts.push((prefix.to_string(), response));
    }

    pub fn rows(&self, prefix: &str, rows: Vec<Vec<Value>>) {
        self.script(prefix, Response::Rows(rows.into_iter().map(Row::new).collect()));
    }

    pub fn fail_connection(&self, prefix: &str) {
        self.script(
            prefix,
            Response::Fail(Error::connection(ConnectionErrorKind::Lost, "server closed the connection")),
        );
    }

    pub fn statements(&self) -> Vec<String> {
        self.state().statements.iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn params_of(&self, idx: usize) -> Vec<Value> {
        self.state().statements[idx].1.clone()
    }

    pub fn connects(&self) -> usize {
        self.state().connect_params.len()
    }

    pub fn open(&self) -> Box<dyn Connection> {
        Box::new(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

impl Connector for MockConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>> {
        self.state().connect_params.push(params.clone());
        Ok(self.open())
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl Connection for MockConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>> {
        Ok(Box::new(MockCursor {
            state: Arc::clone(&self.state),
            rows: VecDeque::new(),
            rowcount: -1,
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }

    fn character_set(&self) -> Option<String> {
        self.state.lock().unwrap().character_set.clone()
    }
}

pub struct MockCursor {
    state: Arc<Mutex<MockState>>,
    rows: VecDeque<Row>,
    rowcount: i64,
}

impl Cursor for MockCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statements.push((sql.to_string(), params.to_vec()));
        match state.answer(sql) {
            Some(Response::Rows(rows)) => {
                self.rowcount = i64::try_from(rows.len()).unwrap();
                self.rows = rows.into();
            }
            Some(Response::Count(n)) => {
                self.rowcount = n;
                self.rows.clear();
            }
            Some(Response::Fail(err)) => return Err(err),
            None => {
                self.rowcount = if sql.starts_with("SELECT") { 0 } else { 1 };
                self.rows.clear();
            }
        }
        Ok(())
    }

    fn fetchone(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn fetchall(&mut self) -> Result<Vec<Row>> {
        Ok(self.rows.drain(..).collect())
    }

    fn rowcount(&self) -> i64 {
        self.rowcount
    }

    fn description(&self) -> Option<Vec<ColumnDescription>> {
        None
    }
}
