//! Knowledge base: a sequence of persisted affordance records
//!
//! Records are concatenated, each closed by its `===` terminator. Loading is
//! all-or-nothing: one bad record fails the whole knowledge base.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use affordance_common::{Action, Domain, LoadError, Result, RECORD_TERMINATOR};
use tracing::{info, instrument};

use super::persistence::LoadOptions;
use super::AffordanceDelegate;

#[derive(Debug)]
pub struct KnowledgeBase<S> {
    delegates: Vec<AffordanceDelegate<S>>,
}

impl<S> Default for KnowledgeBase<S> {
    fn default() -> Self {
        Self {
            delegates: Vec::new(),
        }
    }
}

impl<S> KnowledgeBase<S> {
    pub fn new(delegates: Vec<AffordanceDelegate<S>>) -> Self {
        Self { delegates }
    }

    pub fn push(&mut self, delegate: AffordanceDelegate<S>) {
        self.delegates.push(delegate);
    }

    pub fn delegates(&self) -> &[AffordanceDelegate<S>] {
        &self.delegates
    }

    pub fn into_delegates(self) -> Vec<AffordanceDelegate<S>> {
        self.delegates
    }

    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.delegates.iter().map(|d| d.to_text()).collect()
    }

    /// Write the knowledge base to `path`
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_text())?;
        info!(path = %path.as_ref().display(), records = self.len(), "saved knowledge base");
        Ok(())
    }
}

impl<S: 'static> KnowledgeBase<S> {
    /// Parse every record in `text`
    pub fn parse(
        domain: &dyn Domain<S>,
        extended_actions: &HashMap<String, Arc<dyn Action<S>>>,
        text: &str,
        options: LoadOptions,
    ) -> std::result::Result<Self, LoadError> {
        let mut delegates = Vec::new();
        let mut chunk = String::new();

        for line in text.lines() {
            chunk.push_str(line);
            chunk.push('\n');
            if line.trim() == RECORD_TERMINATOR {
                delegates.push(AffordanceDelegate::load_with_options(
                    domain,
                    extended_actions,
                    &chunk,
                    options,
                )?);
                chunk.clear();
            }
        }

        if !chunk.trim().is_empty() {
            return Err(LoadError::MissingTerminator);
        }

        Ok(Self { delegates })
    }

    /// Read and parse the knowledge base at `path`
    #[instrument(skip(domain, extended_actions, path), fields(path = %path.as_ref().display()))]
    pub fn load_file(
        domain: &dyn Domain<S>,
        extended_actions: &HashMap<String, Arc<dyn Action<S>>>,
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let kb = Self::parse(domain, extended_actions, &text, options)?;
        info!(records = kb.len(), "loaded knowledge base");
        Ok(kb)
    }
}
