//! Persisted record format
//!
//! ```text
//! <precondition>,<goal>
//! <action>,<activeOptimalCount>,<totalOptimalCount>
//! ...
//! ---                          (optional legacy section, ignored)
//! ...
//! ===
//! ```
//!
//! Predicates and actions bound to their canonical free variables are written
//! by name alone; any other binding is written as `name(p1,p2)`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use affordance_common::{
    free_variables, Action, Domain, GroundedAction, GroundedProp, LoadError, LogicalExpression,
    PfAtom, LEGACY_SECTION_SEPARATOR, RECORD_TERMINATOR,
};
use tracing::{debug, trace};

use super::AffordanceDelegate;
use crate::affordance::record::{ActionCounts, AffordanceRecord};

/// Options controlling how a record is parsed
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Expert knowledge bases may omit the total column
    pub expert: bool,
    /// Total count assumed for expert lines without a total column
    pub expert_total_count: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            expert: false,
            expert_total_count: crate::DEFAULT_EXPERT_TOTAL_COUNT,
        }
    }
}

impl LoadOptions {
    pub fn expert(expert: bool) -> Self {
        Self {
            expert,
            ..Self::default()
        }
    }
}

enum Section {
    Header,
    Counts,
    Legacy,
}

impl<S: 'static> AffordanceDelegate<S> {
    /// Load a single delegate from its persisted text.
    ///
    /// Action names are resolved against the domain's primitive actions first,
    /// then against `extended_actions` (options, macro-actions).
    pub fn load(
        domain: &dyn Domain<S>,
        extended_actions: &HashMap<String, Arc<dyn Action<S>>>,
        text: &str,
        expert: bool,
    ) -> Result<Self, LoadError> {
        Self::load_with_options(domain, extended_actions, text, LoadOptions::expert(expert))
    }

    pub fn load_with_options(
        domain: &dyn Domain<S>,
        extended_actions: &HashMap<String, Arc<dyn Action<S>>>,
        text: &str,
        options: LoadOptions,
    ) -> Result<Self, LoadError> {
        let mut section = Section::Header;
        let mut terminated = false;
        let mut header: Option<Header<S>> = None;
        let mut entries: Vec<(GroundedAction<S>, ActionCounts)> = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line == RECORD_TERMINATOR {
                terminated = true;
                break;
            }

            match section {
                Section::Header => {
                    header = Some(parse_header(domain, line)?);
                    section = Section::Counts;
                }
                Section::Counts if line == LEGACY_SECTION_SEPARATOR => {
                    trace!(line_no, "skipping legacy action-set-size section");
                    section = Section::Legacy;
                }
                Section::Counts => {
                    let (action, counts) =
                        parse_count_line(domain, extended_actions, line, line_no, options)?;
                    if !seen.insert(action.key().clone()) {
                        return Err(LoadError::DuplicateAction(action.key().to_string()));
                    }
                    entries.push((action, counts));
                }
                Section::Legacy => {}
            }
        }

        let (precondition, goal) = header.ok_or(LoadError::MissingHeader)?;
        if !terminated {
            return Err(LoadError::MissingTerminator);
        }
        if entries.is_empty() {
            return Err(LoadError::EmptyRecord(format!(
                "{},{}",
                precondition.description(),
                goal.description()
            )));
        }

        let record = AffordanceRecord::with_counts(precondition, goal, entries)?;
        debug!(
            affordance = %record,
            actions = record.actions().len(),
            activations = record.num_activations(),
            "loaded affordance"
        );
        Ok(AffordanceDelegate::new(record))
    }
}

impl<S> AffordanceDelegate<S> {
    /// Serialize the record; `load` of the output reproduces the counts
    pub fn to_text(&self) -> String {
        let record = self.record();
        let mut out = format!(
            "{},{}\n",
            record.precondition().description(),
            record.goal().description()
        );

        for action in record.actions() {
            let counts = record.counts(action.key()).unwrap_or_default();
            out.push_str(&format!(
                "{},{},{}\n",
                persisted_action(action),
                counts.active_optimal,
                counts.total_optimal
            ));
        }

        out.push_str(RECORD_TERMINATOR);
        out.push('\n');
        out
    }
}

type Header<S> = (Arc<dyn LogicalExpression<S>>, Arc<dyn LogicalExpression<S>>);

fn parse_header<S: 'static>(domain: &dyn Domain<S>, line: &str) -> Result<Header<S>, LoadError> {
    let malformed = || LoadError::MalformedHeader(line.to_string());
    let fields = split_fields(line).ok_or_else(malformed)?;
    let [precondition, goal] = fields.as_slice() else {
        return Err(malformed());
    };
    if precondition.is_empty() || goal.is_empty() {
        return Err(malformed());
    }

    Ok((atom(domain, precondition, line)?, atom(domain, goal, line)?))
}

fn atom<S: 'static>(
    domain: &dyn Domain<S>,
    token: &str,
    line: &str,
) -> Result<Arc<dyn LogicalExpression<S>>, LoadError> {
    let (name, bindings) =
        split_bindings(token).ok_or_else(|| LoadError::MalformedHeader(line.to_string()))?;
    let function = domain
        .propositional_function(name)
        .ok_or_else(|| LoadError::UnknownPredicate(name.to_string()))?;
    let prop = match bindings {
        Some(params) => GroundedProp::new(function, params),
        None => GroundedProp::with_free_variables(function),
    };
    Ok(Arc::new(PfAtom::new(prop)))
}

fn parse_count_line<S>(
    domain: &dyn Domain<S>,
    extended_actions: &HashMap<String, Arc<dyn Action<S>>>,
    line: &str,
    line_no: usize,
    options: LoadOptions,
) -> Result<(GroundedAction<S>, ActionCounts), LoadError> {
    let malformed = || LoadError::MalformedCountLine {
        line_no,
        line: line.to_string(),
    };
    let fields = split_fields(line).ok_or_else(malformed)?;
    let (token, active, total) = match fields.as_slice() {
        [token, active, total] => (*token, *active, Some(*total)),
        [token, active] if options.expert => (*token, *active, None),
        _ => return Err(malformed()),
    };
    let (name, bindings) = split_bindings(token).ok_or_else(malformed)?;

    let active = parse_count(active, line_no)?;
    let total = match total {
        Some(total) => parse_count(total, line_no)?,
        None => options.expert_total_count,
    };

    let action = domain
        .action(name)
        .or_else(|| extended_actions.get(name).cloned())
        .ok_or_else(|| LoadError::UnknownAction(name.to_string()))?;

    let action = match bindings {
        Some(params) => GroundedAction::new(action, params),
        None => GroundedAction::with_free_variables(action),
    };
    Ok((action, ActionCounts::new(active, total)))
}

/// Name alone for the canonical free-variable grounding, `name(p1,p2)` otherwise
fn persisted_action<S>(action: &GroundedAction<S>) -> String {
    if action.params() == free_variables(action.action().parameter_classes()).as_slice() {
        action.name().to_string()
    } else {
        format!("{}({})", action.name(), action.params().join(","))
    }
}

/// Split on commas outside parentheses. `None` when parentheses don't balance.
fn split_fields(line: &str) -> Option<Vec<&str>> {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in line.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                fields.push(line[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    fields.push(line[start..].trim());
    Some(fields)
}

/// `name` or `name(p1,p2)`: the name and its explicit bindings, if any
fn split_bindings(token: &str) -> Option<(&str, Option<Vec<String>>)> {
    let Some((name, rest)) = token.split_once('(') else {
        return Some((token, None));
    };
    let inner = rest.strip_suffix(')')?;
    if inner.contains(['(', ')']) || name.trim().is_empty() {
        return None;
    }
    let params = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|p| p.trim().to_string()).collect()
    };
    Some((name.trim(), Some(params)))
}

fn parse_count(value: &str, line_no: usize) -> Result<u64, LoadError> {
    value.parse().map_err(|_| LoadError::InvalidCount {
        line_no,
        value: value.to_string(),
    })
}
