//! Datasources.
//!
//! A [`Datasource`] owns one backend connection and one "modify cursor" on
//! which every INSERT, UPDATE and DELETE runs. It renders statements for its
//! backend, turns result rows into mapped objects, writes the changes those
//! objects accumulate and translates backend errors.
//!
//! # Example
//!
//! ```ignore
//! let mut ds = Datasource::open(&"adapter=pgsql db=hr".parse()?, connector)?;
//!
//! let ann = DbObject::with_values(&person, [("firstname", "Ann"), ("lastname", "Lee")])?;
//! ds.insert(&ann)?;                  // INSERT, then SELECT of the new id
//!
//! ann.set("height", 171)?;           // recorded, nothing sent yet
//! ds.commit()?;                      // UPDATE ... WHERE id = 1, then COMMIT
//! ```
//!
//! # Failure handling
//!
//! Programming errors roll the transaction back and surface as duplicate-key
//! or backend errors. Connectivity errors are counted; once more than the
//! configured number of consecutive failures occurred the datasource
//! reconnects and retries the statement once.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use sqlorm_core::{
    Backend, ConnectParams, Connection, Connector, Cursor, Error, Result, Row,
    TextEncoding, Value,
};
use sqlorm_query::{
    Clause, Delete, GroupBy, Insert, Join, OrderBy, Part, Render, Runner, Select, Statement,
    Update, Where, limit,
};
use sqlorm_schema::{DbClass, DbObject, ForeignKey, GeneratedKey, Key, PendingWrites};

use crate::adapter::{AdapterKind, PostInsert};
use crate::config::{DatasourceConfig, FetchMode};
use crate::connstr::ConnectionString;
use crate::result::ResultSet;

// ============================================================================
// Select clauses
// ============================================================================

/// A clause handed to [`Datasource::select`].
#[derive(Debug, Clone)]
pub enum SelectClause {
    Clause(Clause),
    /// `GROUP BY` every stored column of a class, the usual companion of a
    /// join
    GroupByClass(Arc<DbClass>),
}

impl SelectClause {
    pub fn group_by_class(class: &Arc<DbClass>) -> Self {
        SelectClause::GroupByClass(Arc::clone(class))
    }

    fn is_join(&self) -> bool {
        matches!(self, SelectClause::Clause(c) if c.is_join())
    }

    fn into_clause(self) -> Clause {
        match self {
            SelectClause::Clause(clause) => clause,
            SelectClause::GroupByClass(class) => Clause::GroupBy(class.group_by_all(true)),
        }
    }
}

impl From<Clause> for SelectClause {
    fn from(clause: Clause) -> Self {
        SelectClause::Clause(clause)
    }
}

impl From<Where> for SelectClause {
    fn from(clause: Where) -> Self {
        SelectClause::Clause(clause.into())
    }
}

impl From<OrderBy> for SelectClause {
    fn from(clause: OrderBy) -> Self {
        SelectClause::Clause(clause.into())
    }
}

impl From<GroupBy> for SelectClause {
    fn from(clause: GroupBy) -> Self {
        SelectClause::Clause(clause.into())
    }
}

impl From<Join> for SelectClause {
    fn from(clause: Join) -> Self {
        SelectClause::Clause(clause.into())
    }
}

// ============================================================================
// Datasource
// ============================================================================

/// Snapshot of a datasource's bookkeeping, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasourceState {
    pub adapter: &'static str,
    pub connected: bool,
    pub pending_writes: usize,
    pub in_transaction: bool,
    pub failures: u32,
    pub reconnect_threshold: Option<u32>,
    pub fetch_mode: FetchMode,
    pub encoding: Option<String>,
}

/// One connection to one database.
pub struct Datasource {
    adapter: AdapterKind,
    backend: &'static Backend,
    config: DatasourceConfig,
    connector: Option<Arc<dyn Connector>>,
    driver_params: ConnectParams,
    conn: Option<Box<dyn Connection>>,
    modify_cursor: Option<Box<dyn Cursor>>,
    pending: Rc<PendingWrites>,
    encoding: Option<TextEncoding>,
    in_transaction: bool,
    failures: u32,
}

impl Datasource {
    /// Connect through `connector`, with connection string keywords
    /// `params`.
    #[tracing::instrument(level = "debug", skip(connector, params, config))]
    pub fn connect(
        adapter: AdapterKind,
        connector: Arc<dyn Connector>,
        params: ConnectParams,
        config: DatasourceConfig,
    ) -> Result<Self> {
        let mut config = config;
        if config.encoding.is_none() {
            config.encoding = adapter.configured_encoding(&params);
        }
        let driver_params = adapter.driver_params(params)?;
        let conn = connector.connect(&driver_params)?;
        tracing::info!(adapter = %adapter, "Connected datasource");

        Ok(Self::from_connection(adapter, conn, config).with_connector(connector, driver_params))
    }

    /// Connect as described by a parsed connection string.
    pub fn open(connection_string: &ConnectionString, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::connect(
            connection_string.adapter(),
            connector,
            connection_string.params().clone(),
            connection_string.config(),
        )
    }

    /// Wrap an open connection. Without [`Datasource::with_connector`] the
    /// datasource cannot reconnect.
    pub fn from_connection(
        adapter: AdapterKind,
        conn: Box<dyn Connection>,
        config: DatasourceConfig,
    ) -> Self {
        Self {
            adapter,
            backend: adapter.backend(),
            config,
            connector: None,
            driver_params: ConnectParams::new(),
            conn: Some(conn),
            modify_cursor: None,
            pending: Rc::new(PendingWrites::new()),
            encoding: None,
            in_transaction: false,
            failures: 0,
        }
    }

    /// Connector and driver keywords used to reconnect.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>, driver_params: ConnectParams) -> Self {
        self.connector = Some(connector);
        self.driver_params = driver_params;
        self
    }

    /// Use an encoding resolved elsewhere instead of asking the backend.
    pub fn with_backend_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Give up the connection, e.g. to return it to a pool.
    pub fn into_connection(mut self) -> Option<Box<dyn Connection>> {
        self.modify_cursor = None;
        self.conn.take()
    }

    pub fn adapter(&self) -> AdapterKind {
        self.adapter
    }

    pub fn backend(&self) -> &'static Backend {
        self.backend
    }

    pub fn config(&self) -> &DatasourceConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Objects with changes waiting for the next flush.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// True once a statement ran since the last commit or rollback.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Route changes of `obj` to this datasource.
    pub fn attach(&self, obj: &DbObject) {
        obj.attach(&self.pending);
    }

    pub fn debug_state(&self) -> DatasourceState {
        DatasourceState {
            adapter: self.adapter.name(),
            connected: self.conn.is_some(),
            pending_writes: self.pending.len(),
            in_transaction: self.in_transaction,
            failures: self.failures,
            reconnect_threshold: self.reconnect_threshold(),
            fetch_mode: self.fetch_mode(),
            encoding: self.encoding.as_ref().map(|e| e.name().to_string()),
        }
    }

    fn reconnect_threshold(&self) -> Option<u32> {
        self.config
            .reconnect_threshold
            .or(self.adapter.default_reconnect_threshold())
    }

    fn fetch_mode(&self) -> FetchMode {
        self.config
            .fetch_mode
            .unwrap_or(self.adapter.default_fetch_mode())
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// The encoding, if it was resolved already.
    pub fn resolved_encoding(&self) -> Option<&TextEncoding> {
        self.encoding.as_ref()
    }

    /// The backend's text encoding, resolved on first use and cached.
    pub fn backend_encoding(&mut self) -> Result<TextEncoding> {
        if let Some(encoding) = &self.encoding {
            return Ok(encoding.clone());
        }

        let encoding = match (self.config.encoding.clone(), self.adapter) {
            (Some(name), _) => TextEncoding::from_name(&name),
            (None, AdapterKind::Pgsql) => {
                let mut cursor = self.connection()?.cursor()?;
                cursor.execute(sqlorm_postgres::ENCODING_QUERY, &[])?;
                let row = cursor.fetchone()?;
                let name = row
                    .as_ref()
                    .and_then(|r| r.get(0))
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Encoding("the backend did not report its encoding".into()))?;
                self.backend.resolve_encoding(name)?
            }
            (None, AdapterKind::Mysql) => match self.connection()?.character_set() {
                Some(name) => self.backend.resolve_encoding(&name.to_lowercase())?,
                None => TextEncoding::default(),
            },
            (None, AdapterKind::Gadfly | AdapterKind::Firebird) => TextEncoding::default(),
        };

        tracing::debug!(encoding = encoding.name(), "Resolved backend encoding");
        self.encoding = Some(encoding.clone());
        Ok(encoding)
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    fn connection(&mut self) -> Result<&mut dyn Connection> {
        Ok(self.conn.as_deref_mut().ok_or(Error::DatasourceClosed)?)
    }

    fn modify_cursor(&mut self) -> Result<&mut dyn Cursor> {
        if self.modify_cursor.is_none() {
            let cursor = self.connection()?.cursor()?;
            self.modify_cursor = Some(cursor);
        }
        Ok(self.modify_cursor.as_deref_mut().ok_or(Error::DatasourceClosed)?)
    }

    fn render(&mut self, node: &dyn Render) -> Result<(String, Vec<Value>)> {
        let encoding = self.backend_encoding()?;
        Runner::new(self.backend).with_encoding(encoding).finish(node)
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if self.config.debug {
            tracing::info!(target: "sqlorm::sql", sql, params = params.len(), "Executing statement");
        } else {
            tracing::debug!(target: "sqlorm::sql", sql, params = params.len(), "Executing statement");
        }
    }

    /// Run `attempt` with the datasource's failure policy.
    fn run_policy<T>(
        &mut self,
        sql: &str,
        params: &[Value],
        attempt: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.log_statement(sql, params);
        self.in_transaction = true;
        match attempt(self) {
            Ok(value) => {
                self.failures = 0;
                Ok(value)
            }
            Err(err) if err.is_programming() => {
                match self.connection().and_then(|c| c.rollback()) {
                    Ok(()) => self.in_transaction = false,
                    Err(rollback_err) => {
                        tracing::warn!(error = %rollback_err, "Rollback after failed statement failed");
                    }
                }
                Err(with_sql(self.adapter.classify_error(err), sql))
            }
            Err(err) if err.is_connectivity() => {
                self.failures += 1;
                let Some(threshold) = self.reconnect_threshold() else {
                    return Err(err);
                };
                if self.failures <= threshold {
                    return Err(err);
                }
                let Some(connector) = self.connector.clone() else {
                    return Err(err);
                };
                self.failures = 0;
                tracing::warn!(error = %err, threshold, "Too many connectivity failures, reconnecting");
                self.reconnect(connector.as_ref())?;
                let retried = attempt(self);
                match &retried {
                    Ok(_) => self.failures = 0,
                    Err(err) if err.is_connectivity() => self.failures += 1,
                    Err(_) => {}
                }
                retried
            }
            Err(err) => Err(err),
        }
    }

    fn reconnect(&mut self, connector: &dyn Connector) -> Result<()> {
        self.modify_cursor = None;
        if let Some(mut old) = self.conn.take() {
            if let Err(err) = old.close() {
                tracing::warn!(error = %err, "Closing the failed connection failed");
            }
        }
        self.conn = Some(connector.connect(&self.driver_params)?);
        tracing::info!(adapter = %self.adapter, "Reconnected datasource");
        Ok(())
    }

    fn exec_modify(&mut self, sql: &str, params: &[Value]) -> Result<i64> {
        self.run_policy(sql, params, |ds| {
            let cursor = ds.modify_cursor()?;
            cursor.execute(sql, params)?;
            Ok(cursor.rowcount())
        })
    }

    fn exec_query(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn Cursor>> {
        self.run_policy(sql, params, |ds| {
            let mut cursor = ds.connection()?.cursor()?;
            cursor.execute(sql, params)?;
            Ok(cursor)
        })
    }

    /// Execute a statement and return the backend's row count.
    ///
    /// INSERT, UPDATE and DELETE run on the modify cursor after pending
    /// changes were flushed.
    pub fn execute(&mut self, statement: &Statement) -> Result<i64> {
        if statement.is_modifying() {
            self.flush_updates()?;
            let (sql, params) = self.render(statement)?;
            self.exec_modify(&sql, &params)
        } else {
            let (sql, params) = self.render(statement)?;
            Ok(self.exec_query(&sql, &params)?.rowcount())
        }
    }

    /// Execute SQL text. Text starting with INSERT, UPDATE or DELETE is
    /// treated as a modifying statement.
    pub fn execute_sql(&mut self, sql: &str, params: &[Value]) -> Result<i64> {
        if is_modifying_sql(sql) {
            self.flush_updates()?;
            self.exec_modify(sql, params)
        } else {
            Ok(self.exec_query(sql, params)?.rowcount())
        }
    }

    /// All rows of `select`.
    pub fn query(&mut self, select: &Select) -> Result<Vec<Row>> {
        let (sql, params) = self.render(select)?;
        self.exec_query(&sql, &params)?.fetchall()
    }

    /// All rows of a query given as SQL text.
    pub fn query_sql(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.exec_query(sql, params)?.fetchall()
    }

    /// The first row of `select`, for queries known to match at most one.
    pub fn query_one(&mut self, select: &Select) -> Result<Option<Row>> {
        Ok(self.query(select)?.into_iter().next())
    }

    /// First column of the first row, NULL for an empty result.
    pub fn query_value(&mut self, select: &Select) -> Result<Value> {
        Ok(self
            .query_one(select)?
            .and_then(|row| row.into_iter().next())
            .unwrap_or(Value::Null))
    }

    pub(crate) fn count_rows(&mut self, select: &Select) -> Result<i64> {
        match self.query_value(select)? {
            Value::Int(n) => Ok(n),
            other => Err(Error::programming(format!(
                "COUNT(*) returned {}",
                other.repr()
            ))),
        }
    }

    // ========================================================================
    // Selecting objects
    // ========================================================================

    /// Select objects of `class`.
    ///
    /// Columns are qualified with the relation as soon as a join is present.
    #[tracing::instrument(level = "debug", skip(self, class, clauses), fields(class = class.name()))]
    pub fn select<I>(&mut self, class: &Arc<DbClass>, clauses: I) -> Result<ResultSet>
    where
        I: IntoIterator<Item = SelectClause>,
    {
        let clauses: Vec<SelectClause> = clauses.into_iter().collect();
        let full = clauses.iter().any(SelectClause::is_join);
        let select = Select::new(class.select_parts(full), [class.relation().clone()])
            .clauses(clauses.into_iter().map(SelectClause::into_clause));
        self.run_select(class, select)
    }

    /// Run a select whose columns are those of [`DbClass::select_parts`].
    pub fn run_select(&mut self, class: &Arc<DbClass>, select: Select) -> Result<ResultSet> {
        let (sql, params) = self.render(&select)?;
        let cursor = self.exec_query(&sql, &params)?;
        let encoding = self.backend_encoding()?;
        ResultSet::new(
            Arc::clone(class),
            select,
            cursor,
            self.fetch_mode(),
            encoding,
            Rc::clone(&self.pending),
        )
    }

    /// The first object the select yields. Adds `LIMIT 1` where the backend
    /// knows it.
    pub fn select_one<I>(&mut self, class: &Arc<DbClass>, clauses: I) -> Result<Option<DbObject>>
    where
        I: IntoIterator<Item = SelectClause>,
    {
        let mut clauses: Vec<SelectClause> = clauses.into_iter().collect();
        if self.backend.supports_limit() {
            clauses.push(limit(1).into());
        }
        self.select(class, clauses)?.next_object()
    }

    /// Number of objects a select would return. Only WHERE clauses and joins
    /// are taken into account.
    pub fn count<I>(&mut self, class: &Arc<DbClass>, clauses: I) -> Result<i64>
    where
        I: IntoIterator<Item = SelectClause>,
    {
        let kept = clauses.into_iter().filter_map(|clause| match clause {
            SelectClause::Clause(c) if c.is_where() || c.is_join() => Some(c),
            _ => None,
        });
        let select = Select::new(["COUNT(*)"], [class.relation().clone()]).clauses(kept);
        self.count_rows(&select)
    }

    /// `WHERE` matching the row of `class` with primary key `key`.
    pub fn primary_key_where(&self, class: &Arc<DbClass>, key: &[Value]) -> Result<Where> {
        Key::primary(class)?.where_for_values(key)
    }

    pub fn select_by_primary_key(
        &mut self,
        class: &Arc<DbClass>,
        key: &[Value],
    ) -> Result<Option<DbObject>> {
        let clause = self.primary_key_where(class, key)?;
        self.select(class, [clause.into()])?.next_object()
    }

    /// A stored object that carries nothing but `key`, without asking the
    /// backend. Assignments to it produce UPDATEs of that row; a key that
    /// matches no row goes unnoticed.
    pub fn select_for_update(&mut self, class: &Arc<DbClass>, key: &[Value]) -> Result<DbObject> {
        let obj = DbObject::stored_with_key(class, key)?;
        obj.attach(&self.pending);
        Ok(obj)
    }

    /// The object `obj` refers to through `foreign_key`.
    pub fn select_referenced(
        &mut self,
        foreign_key: &ForeignKey,
        obj: &DbObject,
    ) -> Result<Option<DbObject>> {
        let clause = foreign_key.target_where(obj)?;
        let class = Arc::clone(foreign_key.target().class());
        self.select_one(&class, [clause.into()])
    }

    /// The objects referring to `target` through `foreign_key`.
    pub fn select_referrers(
        &mut self,
        foreign_key: &ForeignKey,
        target: &DbObject,
    ) -> Result<ResultSet> {
        let clause = foreign_key.referrers_where(target)?;
        let class = Arc::clone(foreign_key.source().class());
        self.select(&class, [clause.into()])
    }

    /// Value of a delayed attribute, fetched on first access. Uncached
    /// attributes are fetched every time.
    pub fn load_delayed(&mut self, obj: &DbObject, attribute: &str) -> Result<Value> {
        let class = obj.class();
        let idx = class.position(attribute)?;
        let Some(cache) = class.field(idx).datatype().delayed() else {
            return obj.get(attribute);
        };
        if let Some(value) = obj.value_at(idx) {
            return Ok(value);
        }
        if !obj.is_stored() {
            return Err(Error::ObjectMustBeInserted(class.name().to_string()));
        }

        let clause = Key::primary(&class)?.where_clause(obj)?;
        let select = Select::new([class.column(idx, false)], [class.relation().clone()]).clause(clause);
        let raw = self.query_value(&select)?;
        let encoding = self.backend_encoding()?;
        obj.set_from_backend(idx, raw, &encoding)?;
        let value = obj.value_at(idx).unwrap_or(Value::Null);
        if !cache {
            obj.unset_at(idx);
        }
        Ok(value)
    }

    // ========================================================================
    // Inserting
    // ========================================================================

    /// INSERT `obj`, then read back the values the backend assigned.
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn insert(&mut self, obj: &DbObject) -> Result<()> {
        self.insert_object(obj, true)
    }

    /// INSERT `obj` without reading anything back.
    pub fn insert_without_select(&mut self, obj: &DbObject) -> Result<()> {
        self.insert_object(obj, false)
    }

    fn insert_object(&mut self, obj: &DbObject, select_after: bool) -> Result<()> {
        let class = obj.class();
        if obj.is_stored() {
            return Err(Error::ObjectAlreadyInserted(class.name().to_string()));
        }
        if self.adapter.post_insert() == PostInsert::PreassignMaxId {
            self.preassign_id(obj)?;
        }

        let (columns, values) = obj.insert_values()?;
        let insert = Insert::values(class.relation().clone(), columns, [values])?;
        self.execute(&Statement::Insert(insert))?;

        let select_after = select_after
            && class.has_primary_key()
            && self.adapter.post_insert().selects_after_insert();
        let post_fields = select_after.then(|| obj.post_insert_fields());
        obj.mark_inserted();
        obj.attach(&self.pending);
        tracing::debug!(class = class.name(), "Inserted object");

        match post_fields.transpose()? {
            Some(fields) => self.select_after_insert(obj, &fields),
            None => Ok(()),
        }
    }

    /// Assign `MAX(id) + 1` to a common serial key on backends that cannot
    /// generate keys.
    fn preassign_id(&mut self, obj: &DbObject) -> Result<()> {
        let class = obj.class();
        let Some((idx, GeneratedKey::CommonSerial)) = class.generated_key() else {
            return Ok(());
        };
        let relation = class.relation().clone();
        let count = self.count_rows(&Select::new(["COUNT(*)"], [relation.clone()]))?;
        let next = if count == 0 {
            1
        } else {
            let max = self.query_value(&Select::new(["MAX(id)"], [relation]))?;
            max.as_i64().unwrap_or(0) + 1
        };
        let encoding = self.backend_encoding()?;
        obj.set_from_backend(idx, Value::Int(next), &encoding)
    }

    /// Read `fields` of a just inserted object back from the backend, on
    /// the modify cursor the INSERT ran on.
    ///
    /// `fields` comes from [`DbObject::post_insert_fields`], taken before the
    /// object was marked inserted.
    pub fn select_after_insert(&mut self, obj: &DbObject, fields: &[usize]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let class = obj.class();
        let clause = self.post_insert_where(obj)?;
        let columns: Vec<Part> = fields
            .iter()
            .map(|&idx| {
                class
                    .field(idx)
                    .datatype()
                    .select_part(&class.context(idx), false)
                    .unwrap_or_else(|| Part::Column(class.column(idx, false)))
            })
            .collect();
        let select = Select::new(columns, [class.relation().clone()]).clause(clause);

        let (sql, params) = self.render(&select)?;
        self.exec_modify(&sql, &params)?;
        let row = self
            .modify_cursor()?
            .fetchone()?
            .ok_or_else(|| Error::ObjectWasNotInserted(class.name().to_string()))?;
        let encoding = self.backend_encoding()?;
        obj.load_row(fields, row, &encoding)
    }

    fn post_insert_where(&self, obj: &DbObject) -> Result<Where> {
        let class = obj.class();
        if let Some(clause) = self.adapter.post_insert().where_clause(&class) {
            return Ok(clause);
        }
        let not_known = || Error::PrimaryKeyNotKnown(class.name().to_string());
        let key = Key::primary(&class).map_err(|_| not_known())?;
        if !key.is_complete(obj) {
            return Err(not_known());
        }
        key.where_clause(obj)
    }

    // ========================================================================
    // Deleting
    // ========================================================================

    /// DELETE the row of `obj`.
    pub fn delete(&mut self, obj: &DbObject) -> Result<i64> {
        let class = obj.class();
        let clause = Key::primary(&class)?.where_clause(obj)?;
        self.delete_where(&class, clause)
    }

    pub fn delete_by_primary_key(&mut self, class: &Arc<DbClass>, key: &[Value]) -> Result<i64> {
        let clause = self.primary_key_where(class, key)?;
        self.delete_where(class, clause)
    }

    pub fn delete_where(&mut self, class: &Arc<DbClass>, clause: Where) -> Result<i64> {
        let delete = Delete::new(class.relation().clone(), Some(clause));
        self.execute(&Statement::Delete(delete))
    }

    /// DELETE every row of the class's relation.
    pub fn delete_all(&mut self, class: &Arc<DbClass>) -> Result<i64> {
        tracing::info!(class = class.name(), "Deleting all rows");
        let delete = Delete::new(class.relation().clone(), None);
        self.execute(&Statement::Delete(delete))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Write the recorded changes of every attached object, in the order the
    /// objects first changed.
    ///
    /// Objects that could not be written stay queued.
    pub fn flush_updates(&mut self) -> Result<()> {
        let objects = self.pending.take();
        if objects.is_empty() {
            return Ok(());
        }
        tracing::debug!(objects = objects.len(), "Flushing updates");
        for (i, obj) in objects.iter().enumerate() {
            if let Err(err) = self.write_update(obj) {
                self.pending.requeue(objects[i..].to_vec());
                return Err(err);
            }
        }
        Ok(())
    }

    fn write_update(&mut self, obj: &DbObject) -> Result<()> {
        let assignments = obj.pending_update()?;
        if assignments.is_empty() {
            obj.clear_changes();
            return Ok(());
        }
        let class = obj.class();
        let clause = Key::primary(&class)?.where_clause(obj)?;
        let update = Update::new(class.relation().clone(), clause, assignments)?;
        let (sql, params) = self.render(&update)?;
        self.exec_modify(&sql, &params)?;
        obj.clear_changes();
        Ok(())
    }

    /// Flush pending changes, then commit.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&mut self) -> Result<()> {
        self.flush_updates()?;
        self.connection()?.commit()?;
        self.in_transaction = false;
        tracing::info!(adapter = %self.adapter, "Committed transaction");
        Ok(())
    }

    /// Undo everything since the last commit. Pending changes stay queued.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&mut self) -> Result<()> {
        self.connection()?.rollback()?;
        self.in_transaction = false;
        tracing::info!(adapter = %self.adapter, "Rolled back transaction");
        Ok(())
    }

    /// Close the connection. Every later operation fails with
    /// [`Error::DatasourceClosed`].
    pub fn close(&mut self) -> Result<()> {
        self.modify_cursor = None;
        self.in_transaction = false;
        if let Some(mut conn) = self.conn.take() {
            conn.close()?;
            tracing::info!(adapter = %self.adapter, "Closed datasource");
        }
        Ok(())
    }

    /// `SELECT 1` on the backend; false if that fails for any reason.
    pub fn ping(&mut self) -> bool {
        self.execute_sql("SELECT 1", &[]).is_ok()
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("adapter", &self.adapter)
            .field("connected", &self.conn.is_some())
            .field("pending", &self.pending.len())
            .field("in_transaction", &self.in_transaction)
            .field("failures", &self.failures)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

fn is_modifying_sql(sql: &str) -> bool {
    let head = sql.trim_start().get(..6).unwrap_or_default();
    ["INSERT", "UPDATE", "DELETE"]
        .iter()
        .any(|keyword| head.eq_ignore_ascii_case(keyword))
}

fn with_sql(error: Error, sql: &str) -> Error {
    match error {
        Error::Query(query) if query.sql.is_none() => Error::Query(query.with_sql(sql)),
        other => other,
    }
}
