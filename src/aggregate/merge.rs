//! Shape-driven merge of per-member dataset values.

use crate::aggregate::IndexKey;
use crate::dataset::{Cell, Payload, Table, TableKind};
use std::collections::HashMap;

/// Tables from several members concatenated under an outer member level
///
/// Row `i` is addressed by `index()[i] == (member key, original row label)`.
/// Duplicate pairs are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedTable {
    kind: TableKind,
    columns: Vec<String>,
    index: Vec<(IndexKey, Cell)>,
    rows: Vec<Vec<Cell>>,
}

impl GroupedTable {
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[(IndexKey, Cell)] {
        &self.index
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct member keys in the order their rows appear
    pub fn members(&self) -> Vec<&IndexKey> {
        let mut seen: Vec<&IndexKey> = Vec::new();
        for (key, _) in &self.index {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }

    /// Rows contributed by one member, with their original labels
    pub fn rows_for<'a>(
        &'a self,
        key: &'a IndexKey,
    ) -> impl Iterator<Item = (&'a Cell, &'a [Cell])> + 'a {
        self.index
            .iter()
            .zip(self.rows.iter())
            .filter(move |((k, _), _)| k == key)
            .map(|((_, label), row)| (label, row.as_slice()))
    }

    /// Values of one column in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let col = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[col]).collect())
    }
}

/// Result of aggregating one dataset across members
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    /// Every value was a table of the same shape family
    Table(GroupedTable),
    /// Anything else, unmerged, in member order
    PerMember(Vec<(IndexKey, Payload)>),
}

impl Aggregated {
    pub fn as_table(&self) -> Option<&GroupedTable> {
        match self {
            Aggregated::Table(t) => Some(t),
            Aggregated::PerMember(_) => None,
        }
    }

    pub fn as_per_member(&self) -> Option<&[(IndexKey, Payload)]> {
        match self {
            Aggregated::PerMember(entries) => Some(entries),
            Aggregated::Table(_) => None,
        }
    }

    /// Value for one member key in the unmerged form
    pub fn get(&self, key: &IndexKey) -> Option<&Payload> {
        self.as_per_member()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p)
    }
}

/// Merge collected values with the lowest-common-denominator rule
pub fn merge(entries: Vec<(IndexKey, Payload)>) -> Aggregated {
    let Some(kind) = uniform_table_kind(&entries) else {
        return Aggregated::PerMember(entries);
    };

    let tables: Vec<(IndexKey, Table)> = entries
        .into_iter()
        .filter_map(|(key, payload)| match payload {
            Payload::Table(table) => Some((key, table)),
            Payload::Opaque(_) => None,
        })
        .collect();

    Aggregated::Table(concat(kind, tables))
}

/// Shape family shared by every entry, if all are tables of one family
fn uniform_table_kind(entries: &[(IndexKey, Payload)]) -> Option<TableKind> {
    let mut kinds = entries.iter().map(|(_, payload)| payload.as_table().map(Table::kind));
    let first = kinds.next()??;
    kinds.all(|k| k == Some(first)).then_some(first)
}

fn concat(kind: TableKind, tables: Vec<(IndexKey, Table)>) -> GroupedTable {
    // A series keeps the first name; frames union their columns in first-seen order.
    let columns: Vec<String> = match kind {
        TableKind::Series => tables
            .first()
            .map(|(_, t)| t.columns().to_vec())
            .unwrap_or_default(),
        TableKind::Frame => {
            let mut columns: Vec<String> = Vec::new();
            for (_, table) in &tables {
                for column in table.columns() {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }
            columns
        }
    };
    let position: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let total = tables.iter().map(|(_, t)| t.len()).sum();
    let mut index = Vec::with_capacity(total);
    let mut rows = Vec::with_capacity(total);

    for (key, table) in &tables {
        let slots: Vec<usize> = match kind {
            TableKind::Series => vec![0],
            TableKind::Frame => table
                .columns()
                .iter()
                .filter_map(|c| position.get(c.as_str()).copied())
                .collect(),
        };
        for (label, row) in table.index().iter().zip(table.rows()) {
            let mut out = vec![Cell::Null; columns.len()];
            for (&slot, cell) in slots.iter().zip(row) {
                out[slot] = cell.clone();
            }
            index.push((key.clone(), label.clone()));
            rows.push(out);
        }
    }

    GroupedTable {
        kind,
        columns,
        index,
        rows,
    }
}
