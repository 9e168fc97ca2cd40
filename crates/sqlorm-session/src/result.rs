//! Results of object selects.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use sqlorm_core::{Cursor, Result, Row, TextEncoding};
use sqlorm_query::{Clause, Select};
use sqlorm_schema::{DbClass, DbObject, PendingWrites};

use crate::config::FetchMode;
use crate::datasource::Datasource;

/// The objects a select produced, read from the cursor as they are
/// consumed.
///
/// A result can be traversed once. Collect it to keep the objects.
pub struct ResultSet {
    class: Arc<DbClass>,
    fields: Vec<usize>,
    select: Select,
    cursor: Box<dyn Cursor>,
    buffered: Option<VecDeque<Row>>,
    encoding: TextEncoding,
    pending: Rc<PendingWrites>,
}

impl ResultSet {
    pub(crate) fn new(
        class: Arc<DbClass>,
        select: Select,
        mut cursor: Box<dyn Cursor>,
        mode: FetchMode,
        encoding: TextEncoding,
        pending: Rc<PendingWrites>,
    ) -> Result<Self> {
        let buffered = match mode {
            FetchMode::Buffered => Some(VecDeque::from(cursor.fetchall()?)),
            FetchMode::Incremental => None,
        };
        Ok(Self {
            fields: class.select_fields(),
            class,
            select,
            cursor,
            buffered,
            encoding,
            pending,
        })
    }

    pub fn class(&self) -> &Arc<DbClass> {
        &self.class
    }

    /// The statement this result was produced by.
    pub fn select(&self) -> &Select {
        &self.select
    }

    /// Next object, `None` once the rows are exhausted.
    pub fn next_object(&mut self) -> Result<Option<DbObject>> {
        let row = match &mut self.buffered {
            Some(rows) => rows.pop_front(),
            None => self.cursor.fetchone()?,
        };
        let Some(row) = row else {
            return Ok(None);
        };
        let obj = DbObject::from_row(&self.class, &self.fields, row, &self.encoding)?;
        obj.attach(&self.pending);
        Ok(Some(obj))
    }

    /// Rows the backend reported for the select, `-1` if the driver does
    /// not know.
    pub fn rowcount(&self) -> i64 {
        self.cursor.rowcount()
    }

    pub fn is_empty(&self) -> bool {
        self.rowcount() == 0
    }

    /// Number of rows the select matches, by a `COUNT(*)` query that keeps
    /// only the WHERE clause.
    pub fn count(&self, ds: &mut Datasource) -> Result<i64> {
        ds.count_rows(&self.select.count_rows(Clause::is_where))
    }
}

impl Iterator for ResultSet {
    type Item = Result<DbObject>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_object().transpose()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("class", &self.class.name())
            .field("buffered", &self.buffered.as_ref().map(VecDeque::len))
            .field("rowcount", &self.cursor.rowcount())
            .finish_non_exhaustive()
    }
}
