//! Span-level identity context.
//!
//! Every agent and registry process runs for exactly one UVN and, for an
//! agent, one cell. Rather than thread that pair through every log call,
//! `Context::attach` records it once on the current span so every event
//! emitted underneath inherits it.

use shared_types::ids::CellId;

/// The UVN (and, for a cell agent, cell) a log span belongs to.
#[derive(Debug, Clone)]
pub struct Context {
    pub uvn_name: String,
    pub cell_id: Option<CellId>,
}

impl Context {
    #[must_use]
    pub fn registry(uvn_name: impl Into<String>) -> Self {
        Self {
            uvn_name: uvn_name.into(),
            cell_id: None,
        }
    }

    #[must_use]
    pub fn cell(uvn_name: impl Into<String>, cell_id: CellId) -> Self {
        Self {
            uvn_name: uvn_name.into(),
            cell_id: Some(cell_id),
        }
    }

    /// Record this context onto the current span. Call once, right after
    /// the span is entered, from whichever span should root every nested
    /// one's `uvn_name`/`cell_id` fields.
    pub fn attach(&self) {
        let span = tracing::Span::current();
        span.record("uvn_name", tracing::field::display(&self.uvn_name));
        if let Some(cell_id) = self.cell_id {
            span.record("cell_id", tracing::field::display(cell_id));
        }
    }

    /// Build the root span for a process carrying this context as fields.
    #[must_use]
    pub fn root_span(&self, name: &'static str) -> tracing::Span {
        match self.cell_id {
            Some(cell_id) => tracing::info_span!(
                "root",
                %name,
                uvn_name = %self.uvn_name,
                cell_id = %cell_id,
            ),
            None => tracing::info_span!("root", %name, uvn_name = %self.uvn_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_context_has_no_cell_id() {
        let ctx = Context::registry("home");
        assert_eq!(ctx.uvn_name, "home");
        assert!(ctx.cell_id.is_none());
    }

    #[test]
    fn cell_context_carries_its_id() {
        let ctx = Context::cell("home", CellId::new(3));
        assert_eq!(ctx.cell_id, Some(CellId::new(3)));
    }
}
