//! Rendering of SQL nodes for one backend.

use sqlorm_core::{Backend, BackendKind, Result, TextEncoding, Value};

/// A node of the statement tree that renders to SQL text.
///
/// Rendering is pure apart from out-of-band parameters pushed onto the
/// runner.
pub trait Render {
    fn render(&self, runner: &mut Runner) -> Result<String>;

    /// Render for `backend` with its default encoding, returning the SQL
    /// text and the out-of-band parameters in placeholder order.
    fn build(&self, backend: &'static Backend) -> Result<(String, Vec<Value>)>
    where
        Self: Sized,
    {
        let mut runner = Runner::new(backend);
        let sql = self.render(&mut runner)?;
        Ok((sql, runner.into_params()))
    }

    /// Render with the generic SQL92 backend.
    fn build_generic(&self) -> Result<(String, Vec<Value>)>
    where
        Self: Sized,
    {
        self.build(Backend::for_kind(BackendKind::Generic))
    }
}

/// Accumulates out-of-band parameters while a statement is rendered.
#[derive(Debug)]
pub struct Runner {
    backend: &'static Backend,
    encoding: TextEncoding,
    params: Vec<Value>,
}

impl Runner {
    pub fn new(backend: &'static Backend) -> Self {
        Self {
            backend,
            encoding: TextEncoding::default(),
            params: Vec::new(),
        }
    }

    /// Use `encoding` for Unicode literals.
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn backend(&self) -> &'static Backend {
        self.backend
    }

    pub fn encoding(&self) -> &TextEncoding {
        &self.encoding
    }

    /// Queue a parameter and return the placeholder to put in its place.
    pub fn push_param(&mut self, value: Value) -> &'static str {
        self.params.push(value);
        self.backend.placeholder()
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Render a list of nodes separated by `sep`.
    pub fn render_list<T: Render>(&mut self, items: &[T], sep: &str) -> Result<String> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(item.render(self)?);
        }
        Ok(out.join(sep))
    }

    /// Render `node` and return text and parameters, consuming the runner.
    pub fn finish(mut self, node: &dyn Render) -> Result<(String, Vec<Value>)> {
        let sql = node.render(&mut self)?;
        tracing::trace!(backend = self.backend.name, sql = %sql, params = self.params.len(), "Rendered statement");
        Ok((sql, self.params))
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}
