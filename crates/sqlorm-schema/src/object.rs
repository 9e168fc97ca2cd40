//! Mapped objects and the pending-write set.
//!
//! A [`DbObject`] is a shared handle to one instance of a mapped class.
//! Every attribute lives in a [`Slot`]. Assignments to an object that is
//! already stored mark the attribute changed and register the object with
//! the [`PendingWrites`] of the datasource it is attached to; nothing is
//! sent to the backend until that datasource flushes.
//!
//! Handles are `Rc` based: an object belongs to the thread of its
//! datasource.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use sqlorm_core::{ColumnSet, Error, Result, Row, TextEncoding, Value};
use sqlorm_query::{Column, Expression, Part};

use crate::class::DbClass;
use crate::datatype::Slot;
use crate::key::Key;

struct ObjectState {
    class: Arc<DbClass>,
    slots: Vec<Slot>,
    changed: ColumnSet,
    stored: bool,
    pending: Option<Weak<PendingWrites>>,
}

/// One instance of a mapped class.
#[derive(Clone)]
pub struct DbObject {
    state: Rc<RefCell<ObjectState>>,
}

impl DbObject {
    /// A new, transient object with every attribute unset.
    pub fn new(class: &Arc<DbClass>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ObjectState {
                class: Arc::clone(class),
                slots: vec![Slot::Unset; class.len()],
                changed: ColumnSet::empty(class.len()),
                stored: false,
                pending: None,
            })),
        }
    }

    /// A new object with the given attributes assigned.
    pub fn with_values<I, S, V>(class: &Arc<DbClass>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        let obj = Self::new(class);
        for (attribute, value) in values {
            obj.set(attribute.as_ref(), value)?;
        }
        Ok(obj)
    }

    fn state(&self) -> Ref<'_, ObjectState> {
        self.state.borrow()
    }

    pub fn class(&self) -> Arc<DbClass> {
        Arc::clone(&self.state().class)
    }

    /// True if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &DbObject) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    /// Current value of `attribute`.
    ///
    /// An attribute that was never assigned nor retrieved reports its
    /// datatype's default, or fails with [`Error::AttributeNotSet`].
    pub fn get(&self, attribute: &str) -> Result<Value> {
        let class = self.class();
        let idx = class.position(attribute)?;
        if let Some(value) = self.value_at(idx) {
            return Ok(value);
        }
        if let Some(default) = class.field(idx).datatype().default_value() {
            return Ok(default);
        }
        Err(Error::AttributeNotSet {
            class: class.name().to_string(),
            attribute: attribute.to_string(),
            key: self.key_description(),
        })
    }

    /// Assign `value` to `attribute`.
    ///
    /// The value is converted and validated first; a failure leaves the
    /// object untouched.
    pub fn set(&self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        let class = self.class();
        let idx = class.position(attribute)?;
        let field = class.field(idx);
        let ctx = class.context(idx);

        field
            .datatype()
            .check_assignment(&ctx, &self.state().slots[idx])?;
        let native = field.datatype().convert(&ctx, value.into())?;
        for validator in field.validators() {
            validator.check(class.name(), attribute, &native)?;
        }

        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.slots[idx].value() != Some(&native);
            state.slots[idx] = Slot::Set(native);
            changed
        };
        if changed {
            self.register_change(idx);
        }
        Ok(())
    }

    /// Bind `attribute` to a raw SQL expression evaluated by the backend.
    ///
    /// Any value held so far is dropped; the attribute reads as unset until
    /// the object is retrieved again.
    pub fn set_expression(&self, attribute: &str, expression: Expression) -> Result<()> {
        let class = self.class();
        let idx = class.position(attribute)?;
        let datatype = class.field(idx).datatype();
        let ctx = class.context(idx);
        if !datatype.accepts_expression() {
            return Err(ctx.conversion_error(format!(
                "Can't set {} columns to expressions.",
                datatype.type_name()
            )));
        }
        datatype.check_assignment(&ctx, &self.state().slots[idx])?;
        self.state.borrow_mut().slots[idx] = Slot::Expression(expression);
        self.register_change(idx);
        Ok(())
    }

    /// True if `attribute` holds a value.
    pub fn is_set(&self, attribute: &str) -> Result<bool> {
        let idx = self.class().position(attribute)?;
        Ok(self.state().slots[idx].is_set())
    }

    /// Value held by field `idx`, if any.
    pub fn value_at(&self, idx: usize) -> Option<Value> {
        self.state().slots[idx].value().cloned()
    }

    pub fn slot_at(&self, idx: usize) -> Slot {
        self.state().slots[idx].clone()
    }

    /// SQL for the current state of field `idx`.
    pub fn literal_at(&self, idx: usize) -> Result<Part> {
        let class = self.class();
        let ctx = class.context(idx);
        match self.slot_at(idx) {
            Slot::Set(value) => class.field(idx).datatype().literal(&ctx, &value),
            Slot::Expression(expression) => Ok(Part::Expression(expression)),
            Slot::Unset => Err(Error::AttributeNotSet {
                class: class.name().to_string(),
                attribute: ctx.attribute.to_string(),
                key: self.key_description(),
            }),
        }
    }

    /// SQL for the current value of `attribute`.
    pub fn literal(&self, attribute: &str) -> Result<Part> {
        let idx = self.class().position(attribute)?;
        self.literal_at(idx)
    }

    // ========================================================================
    // Persistence state
    // ========================================================================

    /// True once the object was inserted or retrieved from the backend.
    pub fn is_stored(&self) -> bool {
        self.state().stored
    }

    /// True if the object has changes not yet written.
    pub fn is_dirty(&self) -> bool {
        !self.state().changed.is_clear()
    }

    pub fn changed_attributes(&self) -> Vec<String> {
        let state = self.state();
        state
            .changed
            .iter()
            .map(|idx| state.class.field(idx).attribute().to_string())
            .collect()
    }

    pub fn primary_key_values(&self) -> Result<Vec<Value>> {
        Key::primary(&self.class())?.values(self)
    }

    /// True if both objects are of the same class and carry the same,
    /// complete primary key.
    pub fn same_row(&self, other: &DbObject) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (ours, theirs) = (self.class(), other.class());
        if ours.name() != theirs.name() || ours.relation() != theirs.relation() {
            return false;
        }
        match (self.primary_key_values(), other.primary_key_values()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn key_description(&self) -> String {
        let state = self.state();
        let Some(key) = state.class.primary_key() else {
            return "no primary key".to_string();
        };
        key.iter()
            .map(|&idx| {
                let attribute = state.class.field(idx).attribute();
                match state.slots[idx].value() {
                    Some(value) => format!("{attribute}={value}"),
                    None => format!("{attribute}=<unset>"),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn register_change(&self, idx: usize) {
        let pending = {
            let mut state = self.state.borrow_mut();
            if !state.stored {
                return;
            }
            state.changed.insert(idx);
            state.pending.as_ref().and_then(Weak::upgrade)
        };
        if let Some(pending) = pending {
            pending.register(self);
        }
    }

    // ========================================================================
    // Datasource side
    // ========================================================================

    /// Route future changes to `pending`.
    pub fn attach(&self, pending: &Rc<PendingWrites>) {
        self.state.borrow_mut().pending = Some(Rc::downgrade(pending));
    }

    pub fn is_attached(&self) -> bool {
        self.state()
            .pending
            .as_ref()
            .is_some_and(|p| p.strong_count() > 0)
    }

    /// Columns and values of an INSERT for this object.
    pub fn insert_values(&self) -> Result<(Vec<Column>, Vec<Part>)> {
        let class = self.class();
        if self.is_stored() {
            return Err(Error::ObjectAlreadyInserted(class.name().to_string()));
        }
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for idx in 0..class.len() {
            if !class.field(idx).datatype().is_writable() || self.slot_at(idx).is_unset() {
                continue;
            }
            columns.push(class.column(idx, false));
            values.push(self.literal_at(idx)?);
        }
        if columns.is_empty() {
            return Err(Error::DbObjContainsNoData(class.name().to_string()));
        }
        Ok((columns, values))
    }

    /// Fields to read back after this object's INSERT. Call before
    /// [`DbObject::mark_inserted`].
    pub fn post_insert_fields(&self) -> Result<Vec<usize>> {
        let class = self.class();
        let mut fields = Vec::new();
        for idx in 0..class.len() {
            let slot = self.slot_at(idx);
            let datatype = class.field(idx).datatype();
            let ctx = class.context(idx);
            let reread = matches!(slot, Slot::Expression(_))
                && datatype.select_part(&ctx, false).is_some();
            if reread || datatype.needs_post_insert_select(&ctx, &slot)? {
                fields.push(idx);
            }
        }
        Ok(fields)
    }

    /// Mark the object stored after its INSERT went through.
    ///
    /// Attributes bound to expressions become unset, so stale data is never
    /// read.
    pub fn mark_inserted(&self) {
        let mut state = self.state.borrow_mut();
        state.stored = true;
        for slot in &mut state.slots {
            if matches!(slot, Slot::Expression(_)) {
                *slot = Slot::Unset;
            }
        }
        state.changed.clear();
    }

    /// `SET` assignments for the changed, writable attributes.
    pub fn pending_update(&self) -> Result<Vec<(Column, Part)>> {
        let class = self.class();
        let changed: Vec<usize> = self.state().changed.iter().collect();
        let mut assignments = Vec::with_capacity(changed.len());
        for idx in changed {
            if class.field(idx).datatype().is_writable() {
                assignments.push((class.column(idx, false), self.literal_at(idx)?));
            }
        }
        Ok(assignments)
    }

    /// Forget recorded changes after they were written. Expression-bound
    /// attributes become unset.
    pub fn clear_changes(&self) {
        let mut state = self.state.borrow_mut();
        let changed: Vec<usize> = state.changed.iter().collect();
        for idx in changed {
            if matches!(state.slots[idx], Slot::Expression(_)) {
                state.slots[idx] = Slot::Unset;
            }
        }
        state.changed.clear();
    }

    /// Store a value produced by the backend, bypassing assignment checks.
    pub fn set_from_backend(&self, idx: usize, value: Value, encoding: &TextEncoding) -> Result<()> {
        let class = self.class();
        let ctx = class.context(idx);
        let native = class.field(idx).datatype().from_row(&ctx, value, encoding)?;
        self.state.borrow_mut().slots[idx] = Slot::Set(native);
        Ok(())
    }

    /// Store the values of a result row, one per entry of `fields`.
    pub fn load_row(&self, fields: &[usize], row: Row, encoding: &TextEncoding) -> Result<()> {
        if row.len() != fields.len() {
            return Err(Error::programming(format!(
                "expected {} columns for {}, got {}",
                fields.len(),
                self.class().name(),
                row.len()
            )));
        }
        for (&idx, value) in fields.iter().zip(row) {
            self.set_from_backend(idx, value, encoding)?;
        }
        Ok(())
    }

    /// A stored object built from a result row.
    pub fn from_row(
        class: &Arc<DbClass>,
        fields: &[usize],
        row: Row,
        encoding: &TextEncoding,
    ) -> Result<Self> {
        let obj = Self::new(class);
        obj.load_row(fields, row, encoding)?;
        obj.state.borrow_mut().stored = true;
        Ok(obj)
    }

    /// A stored object carrying nothing but its primary key, for operations
    /// addressed by key.
    pub fn stored_with_key(class: &Arc<DbClass>, values: &[Value]) -> Result<Self> {
        let key = Key::primary(class)?;
        if values.len() != key.len() {
            return Err(Error::IllegalPrimaryKey {
                class: class.name().to_string(),
                expected: key.len(),
            });
        }
        let obj = Self::new(class);
        for (&idx, value) in key.fields().iter().zip(values) {
            let ctx = class.context(idx);
            let native = class.field(idx).datatype().convert(&ctx, value.clone())?;
            obj.state.borrow_mut().slots[idx] = Slot::Set(native);
        }
        obj.state.borrow_mut().stored = true;
        Ok(obj)
    }

    /// Drop the value of field `idx`, as for uncached delayed columns.
    pub fn unset_at(&self, idx: usize) {
        self.state.borrow_mut().slots[idx] = Slot::Unset;
    }
}

impl fmt::Debug for DbObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(state) = self.state.try_borrow() else {
            return f.write_str("DbObject(<borrowed>)");
        };
        let mut s = f.debug_struct(state.class.name());
        for (field, slot) in state.class.fields().iter().zip(&state.slots) {
            match slot {
                Slot::Unset => {}
                Slot::Set(value) => {
                    s.field(field.attribute(), value);
                }
                Slot::Expression(_) => {
                    s.field(field.attribute(), &"<expression>");
                }
            }
        }
        s.field("stored", &state.stored).finish()
    }
}

// ============================================================================
// Pending writes
// ============================================================================

/// Objects with changes waiting for the next flush, in registration order.
#[derive(Debug, Default)]
pub struct PendingWrites {
    queue: RefCell<Vec<DbObject>>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `obj` unless it is already queued.
    pub fn register(&self, obj: &DbObject) {
        let mut queue = self.queue.borrow_mut();
        if !queue.iter().any(|queued| queued.ptr_eq(obj)) {
            queue.push(obj.clone());
        }
    }

    /// Remove and return every queued object.
    pub fn take(&self) -> Vec<DbObject> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    /// Put objects back in front of the queue after a failed flush.
    pub fn requeue(&self, objects: Vec<DbObject>) {
        let mut queue = self.queue.borrow_mut();
        let rest = std::mem::replace(&mut *queue, objects);
        for obj in rest {
            if !queue.iter().any(|queued| queued.ptr_eq(&obj)) {
                queue.push(obj);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{CommonSerial, Integer, Unicode};
    use crate::field::Field;
    use crate::wrappers::Csv;
    use sqlorm_core::Validator;
    use sqlorm_query::{Render, expr};

    fn person() -> Arc<DbClass> {
        DbClass::builder("person")
            .field(Field::new("id", CommonSerial))
            .field(Field::new("firstname", Unicode::new()))
            .field(Field::new("lastname", Unicode::new()).validator(Validator::NotEmpty))
            .field(Field::new("height", Integer))
            .field(Field::new("tags", Csv::new(Unicode::new())))
            .build()
            .unwrap()
    }

    fn stored_person(pending: &Rc<PendingWrites>) -> DbObject {
        let class = person();
        let obj = DbObject::from_row(
            &class,
            &[0, 1, 3],
            Row::new(vec![Value::Int(1), Value::from("Ann"), Value::Int(170)]),
            &TextEncoding::Utf8,
        )
        .unwrap();
        obj.attach(pending);
        obj
    }

    #[test]
    fn test_unset_attribute_message() {
        let obj = DbObject::new(&person());
        let err = obj.get("height").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attribute 'height' of 'person' [ id=<unset> ] has not yet been set"
        );
    }

    #[test]
    fn test_common_serial_cannot_be_assigned() {
        let obj = DbObject::new(&person());
        assert!(matches!(
            obj.set("id", 5),
            Err(Error::ImmutableAttribute { .. })
        ));
    }

    #[test]
    fn test_failed_validation_leaves_value() {
        let obj = DbObject::new(&person());
        obj.set("lastname", "Lee").unwrap();
        assert!(matches!(obj.set("lastname", ""), Err(Error::Validation(_))));
        assert_eq!(obj.get("lastname").unwrap(), Value::from("Lee"));
    }

    #[test]
    fn test_insert_guard() {
        let obj = DbObject::new(&person());
        assert!(matches!(
            obj.insert_values(),
            Err(Error::DbObjContainsNoData(_))
        ));
        obj.set("firstname", "Ann").unwrap();
        let (columns, values) = obj.insert_values().unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(values.len(), 1);
        assert_eq!(obj.post_insert_fields().unwrap(), vec![0]);
    }

    #[test]
    fn test_transient_changes_are_not_registered() {
        let pending = Rc::new(PendingWrites::new());
        let obj = DbObject::new(&person());
        obj.attach(&pending);
        obj.set("height", 170).unwrap();
        assert!(!obj.is_dirty());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_same_value_marks_dirty_once() {
        let pending = Rc::new(PendingWrites::new());
        let obj = stored_person(&pending);
        obj.set("height", 170).unwrap();
        assert!(!obj.is_dirty());
        obj.set("height", 171).unwrap();
        obj.set("height", 171).unwrap();
        obj.set("height", 172).unwrap();
        assert_eq!(obj.changed_attributes(), vec!["height".to_string()]);
        assert_eq!(pending.len(), 1);

        let update = obj.pending_update().unwrap();
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].1.build_generic().unwrap().0, "172");
        obj.clear_changes();
        assert!(!obj.is_dirty());
    }

    #[test]
    fn test_expression_assignment_clears_value() {
        let pending = Rc::new(PendingWrites::new());
        let obj = stored_person(&pending);
        obj.set_expression("height", expr!["height + 1"]).unwrap();
        assert!(!obj.is_set("height").unwrap());
        assert!(obj.get("height").is_err());
        assert_eq!(pending.len(), 1);
        let update = obj.pending_update().unwrap();
        assert_eq!(update[0].1.build_generic().unwrap().0, "height + 1");
    }

    #[test]
    fn test_csv_rejects_expressions() {
        let obj = DbObject::new(&person());
        let err = obj.set_expression("tags", expr!["'a,b'"]).unwrap_err();
        assert_eq!(err.to_string(), "person.tags: Can't set csv columns to expressions.");
    }

    #[test]
    fn test_csv_round_trip() {
        let obj = DbObject::new(&person());
        obj.set("tags", Value::Array(vec!["a".into(), "b".into(), "c".into()]))
            .unwrap();
        assert_eq!(
            obj.literal("tags").unwrap().build_generic().unwrap().0,
            "'a,b,c'"
        );
        obj.set_from_backend(4, Value::from("a,b,c"), &TextEncoding::Utf8)
            .unwrap();
        assert_eq!(
            obj.get("tags").unwrap(),
            Value::Array(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_already_inserted() {
        let pending = Rc::new(PendingWrites::new());
        let obj = stored_person(&pending);
        assert!(matches!(
            obj.insert_values(),
            Err(Error::ObjectAlreadyInserted(_))
        ));
    }

    #[test]
    fn test_same_row_by_key() {
        let class = person();
        let a = DbObject::stored_with_key(&class, &[Value::Int(4)]).unwrap();
        let b = DbObject::stored_with_key(&class, &[Value::from("4")]).unwrap();
        assert!(a.same_row(&b));
        assert!(!a.same_row(&DbObject::new(&class)));
    }

    #[test]
    fn test_requeue_keeps_failed_objects_first() {
        let pending = PendingWrites::new();
        let class = person();
        let (a, b, c) = (DbObject::new(&class), DbObject::new(&class), DbObject::new(&class));
        pending.register(&a);
        pending.register(&b);
        let taken = pending.take();
        pending.register(&c);
        pending.requeue(taken);
        let order = pending.take();
        assert!(order[0].ptr_eq(&a) && order[1].ptr_eq(&b) && order[2].ptr_eq(&c));
    }
}
