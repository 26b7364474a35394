//! Incremental reconciliation of ordered row lists against what was last rendered.
//!
//! Every pass produces the smallest set of [`RowOp`]s that turns the previous
//! table into the new one: rows are matched by a stable [`RowKey`], only cells
//! whose text changed are sent, rows already in place are not moved, and rows
//! that vanished are removed. The table is padded with placeholders up to a
//! fixed viewport so its height never changes.

use std::{cmp::Ordering, collections::HashSet, fmt};

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::snapshot::{EntrantRow, SeenTagRow};

/// Stable identity of a rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    /// Key of a row carrying an entrant id.
    pub fn entrant(id: &str) -> Self {
        Self(format!("id:{id}"))
    }

    /// Composite key for rows without an entrant id.
    pub fn composite(number: Option<&str>, name: Option<&str>, index: usize) -> Self {
        Self(format!(
            "row:{}|{}|{index}",
            number.unwrap_or_default(),
            name.unwrap_or_default()
        ))
    }

    /// Prefer the entrant id, fall back to number, name and position.
    pub fn for_row(
        entrant_id: Option<&str>,
        number: Option<&str>,
        name: Option<&str>,
        index: usize,
    ) -> Self {
        match entrant_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self::entrant(id),
            None => Self::composite(number, name, index),
        }
    }

    /// Raw key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row that can be rendered into a table.
pub trait TableRow {
    /// Stable key for the row at `index` in the received list.
    fn key(&self, index: usize) -> RowKey;
    /// Cell texts, in column order.
    fn cells(&self) -> Vec<String>;
    fn enabled(&self) -> bool;
}

/// Column headers of the standings table.
pub const STANDINGS_COLUMNS: [&str; 7] = ["pos", "number", "name", "laps", "last", "best", "gap"];
/// Column headers of the seen-tags table.
pub const SEEN_COLUMNS: [&str; 4] = ["number", "name", "tag", "reads"];

impl TableRow for EntrantRow {
    fn key(&self, index: usize) -> RowKey {
        RowKey::for_row(
            self.entrant_id.as_deref(),
            self.number.as_deref(),
            self.name.as_deref(),
            index,
        )
    }

    fn cells(&self) -> Vec<String> {
        vec![
            text(self.position.map(|p| p.to_string())),
            text(self.number.clone()),
            text(self.name.clone()),
            text(self.laps.map(|l| l.to_string())),
            text(self.last_time.clone()),
            text(self.best_time.clone()),
            match self.lap_deficit {
                None | Some(0) => String::new(),
                Some(1) => "-1 lap".to_string(),
                Some(n) => format!("-{n} laps"),
            },
        ]
    }

    fn enabled(&self) -> bool {
        self.is_enabled()
    }
}

impl TableRow for SeenTagRow {
    fn key(&self, index: usize) -> RowKey {
        match self.tag.as_deref().map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) if self.entrant_id.is_none() => RowKey(format!("tag:{tag}")),
            _ => RowKey::for_row(
                self.entrant_id.as_deref(),
                self.number.as_deref(),
                self.name.as_deref(),
                index,
            ),
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            text(self.number.clone()),
            text(self.name.clone()),
            text(self.tag.clone()),
            text(self.reads.map(|r| r.to_string())),
        ]
    }

    fn enabled(&self) -> bool {
        self.is_enabled()
    }
}

/// Ordering used by the seen-tags view: enabled first, then most reads, then
/// lowest number.
pub fn seen_tag_order(a: &SeenTagRow, b: &SeenTagRow) -> Ordering {
    b.is_enabled()
        .cmp(&a.is_enabled())
        .then_with(|| b.reads.unwrap_or(0).cmp(&a.reads.unwrap_or(0)))
        .then_with(|| compare_numbers(a.number.as_deref(), b.number.as_deref()))
}

/// Numeric when both sides parse, text otherwise; unknown numbers sort last.
fn compare_numbers(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn text(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// One changed cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CellChange {
    /// Column index.
    pub column: usize,
    /// New cell text.
    pub text: String,
}

/// A single visual mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RowOp {
    /// Build a new row and insert it at `index`.
    Create {
        /// Row being created.
        key: RowKey,
        /// Visual identity kept for the row's lifetime.
        identity: u64,
        /// Position the row is inserted at.
        index: usize,
        /// Cell texts in column order.
        cells: Vec<String>,
        /// Whether the row is styled as enabled.
        enabled: bool,
    },
    /// Rewrite the listed cells of an existing row.
    Update { key: RowKey, changes: Vec<CellChange> },
    /// Toggle the disabled styling of an existing row.
    Enable { key: RowKey, enabled: bool },
    /// Move an existing row to `index`.
    Move { key: RowKey, index: usize },
    /// Drop a row that is no longer listed.
    Remove { key: RowKey },
}

/// Mutations produced by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RowPatch {
    /// Mutations in application order.
    pub ops: Vec<RowOp>,
    /// New placeholder count, present only when it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholders: Option<usize>,
}

impl RowPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.placeholders.is_none()
    }

    /// Number of ops that create or reorder rows.
    pub fn structural_ops(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, RowOp::Create { .. } | RowOp::Move { .. }))
            .count()
    }
}

/// A rendered row as the view holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RenderedRow {
    /// Stable row key.
    pub key: RowKey,
    /// Assigned once at creation and kept for the row's lifetime.
    pub identity: u64,
    /// Cell texts in column order.
    pub cells: Vec<String>,
    /// Whether the row is styled as enabled.
    pub enabled: bool,
}

/// Full rendered table, sent to clients that connect mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RenderedTable {
    /// Column headers.
    pub columns: Vec<String>,
    /// Rows in display order.
    pub rows: Vec<RenderedRow>,
    /// Empty rows padding the table to the viewport.
    pub placeholders: usize,
}

#[derive(Debug, Clone)]
struct Rendered {
    identity: u64,
    cells: Vec<String>,
    enabled: bool,
}

/// Keeps the last rendered table and diffs new row lists against it.
#[derive(Debug, Clone)]
pub struct RowReconciler {
    columns: &'static [&'static str],
    rows: IndexMap<RowKey, Rendered>,
    viewport: usize,
    placeholders: usize,
    next_identity: u64,
}

impl RowReconciler {
    /// Create an empty table padded to `viewport` placeholder rows.
    pub fn new(columns: &'static [&'static str], viewport: usize) -> Self {
        Self {
            columns,
            rows: IndexMap::new(),
            viewport,
            placeholders: viewport,
            next_identity: 1,
        }
    }

    /// Reconcile against `rows` in received order.
    pub fn reconcile<R: TableRow>(&mut self, rows: &[R]) -> RowPatch {
        let keyed = keyed_rows(rows);
        self.apply(&keyed)
    }

    /// Reconcile against `rows` ordered by `order`; keys still come from the
    /// received positions.
    pub fn reconcile_sorted<R, F>(&mut self, rows: &[R], mut order: F) -> RowPatch
    where
        R: TableRow,
        F: FnMut(&R, &R) -> Ordering,
    {
        let mut keyed = keyed_rows(rows);
        keyed.sort_by(|(_, a), (_, b)| order(*a, *b));
        self.apply(&keyed)
    }

    /// Keys currently rendered, in display order.
    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.rows.keys()
    }

    /// Visual identity of a rendered row.
    pub fn identity(&self, key: &RowKey) -> Option<u64> {
        self.rows.get(key).map(|row| row.identity)
    }

    /// Placeholder rows currently rendered.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Rows currently rendered.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row is rendered.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full table for clients joining mid-session.
    pub fn table(&self) -> RenderedTable {
        RenderedTable {
            columns: self.columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|(key, row)| RenderedRow {
                    key: key.clone(),
                    identity: row.identity,
                    cells: row.cells.clone(),
                    enabled: row.enabled,
                })
                .collect(),
            placeholders: self.placeholders,
        }
    }

    fn apply<R: TableRow>(&mut self, keyed: &[(RowKey, &R)]) -> RowPatch {
        let mut patch = RowPatch::default();
        let incoming: HashSet<&RowKey> = keyed.iter().map(|(key, _)| key).collect();

        let stale: Vec<RowKey> = self
            .rows
            .keys()
            .filter(|key| !incoming.contains(key))
            .cloned()
            .collect();
        for key in stale {
            self.rows.shift_remove(&key);
            patch.ops.push(RowOp::Remove { key });
        }

        for (index, (key, row)) in keyed.iter().enumerate() {
            let cells = row.cells();
            let enabled = row.enabled();

            match self.rows.get_index_of(key) {
                Some(current) => {
                    let rendered = &mut self.rows[current];

                    let changes = diff_cells(&rendered.cells, &cells);
                    if !changes.is_empty() {
                        rendered.cells = cells;
                        patch.ops.push(RowOp::Update {
                            key: key.clone(),
                            changes,
                        });
                    }
                    if rendered.enabled != enabled {
                        rendered.enabled = enabled;
                        patch.ops.push(RowOp::Enable {
                            key: key.clone(),
                            enabled,
                        });
                    }

                    // Rows before `index` are already settled, so `current >= index`.
                    if current != index {
                        self.rows.move_index(current, index);
                        patch.ops.push(RowOp::Move {
                            key: key.clone(),
                            index,
                        });
                    }
                }
                None => {
                    let identity = self.next_identity;
                    self.next_identity += 1;
                    self.rows.shift_insert(
                        index,
                        key.clone(),
                        Rendered {
                            identity,
                            cells: cells.clone(),
                            enabled,
                        },
                    );
                    patch.ops.push(RowOp::Create {
                        key: key.clone(),
                        identity,
                        index,
                        cells,
                        enabled,
                    });
                }
            }
        }

        let placeholders = self.viewport.saturating_sub(self.rows.len());
        if placeholders != self.placeholders {
            self.placeholders = placeholders;
            patch.placeholders = Some(placeholders);
        }

        patch
    }
}

/// Pair rows with their keys; a key seen twice in one list falls back to the
/// composite form so rows never collapse into each other.
fn keyed_rows<R: TableRow>(rows: &[R]) -> Vec<(RowKey, &R)> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let mut key = row.key(index);
            if !seen.insert(key.clone()) {
                key = RowKey(format!("{key}#{index}"));
                seen.insert(key.clone());
            }
            (key, row)
        })
        .collect()
}

fn diff_cells(old: &[String], new: &[String]) -> Vec<CellChange> {
    new.iter()
        .enumerate()
        .filter(|(column, text)| old.get(*column) != Some(*text))
        .map(|(column, text)| CellChange {
            column,
            text: text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(id: &str, laps: u32) -> EntrantRow {
        EntrantRow {
            entrant_id: Some(id.to_string()),
            number: Some(id.to_string()),
            name: Some(format!("Driver {id}")),
            laps: Some(laps),
            ..Default::default()
        }
    }

    fn keys(reconciler: &RowReconciler) -> Vec<String> {
        reconciler.keys().map(|k| k.as_str().to_string()).collect()
    }

    #[test]
    fn keeps_identity_of_surviving_rows() {
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 16);
        table.reconcile(&[entrant("1", 0), entrant("2", 0), entrant("3", 0)]);
        let two = table.identity(&RowKey::entrant("2")).unwrap();
        let three = table.identity(&RowKey::entrant("3")).unwrap();

        let patch = table.reconcile(&[entrant("2", 0), entrant("3", 0), entrant("4", 0)]);

        assert_eq!(keys(&table), vec!["id:2", "id:3", "id:4"]);
        assert_eq!(table.identity(&RowKey::entrant("2")), Some(two));
        assert_eq!(table.identity(&RowKey::entrant("3")), Some(three));
        assert!(patch.ops.contains(&RowOp::Remove {
            key: RowKey::entrant("1")
        }));
        let created: Vec<_> = patch
            .ops
            .iter()
            .filter_map(|op| match op {
                RowOp::Create { key, index, .. } => Some((key.clone(), *index)),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![(RowKey::entrant("4"), 2)]);
        assert_eq!(patch.structural_ops(), 1);
    }

    #[test]
    fn unchanged_rows_produce_no_ops() {
        let rows = [entrant("1", 2), entrant("2", 1)];
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 16);
        table.reconcile(&rows);

        let patch = table.reconcile(&rows);

        assert!(patch.is_empty(), "unexpected ops: {patch:?}");
    }

    #[test]
    fn only_changed_cells_are_updated() {
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 16);
        table.reconcile(&[entrant("1", 2)]);

        let mut row = entrant("1", 3);
        row.last_time = Some("1:01.2".into());
        let patch = table.reconcile(&[row]);

        assert_eq!(
            patch.ops,
            vec![RowOp::Update {
                key: RowKey::entrant("1"),
                changes: vec![
                    CellChange {
                        column: 3,
                        text: "3".into(),
                    },
                    CellChange {
                        column: 4,
                        text: "1:01.2".into(),
                    },
                ],
            }]
        );
    }

    #[test]
    fn overtake_is_a_single_move() {
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 16);
        table.reconcile(&[entrant("1", 5), entrant("2", 5), entrant("3", 5)]);

        let patch = table.reconcile(&[entrant("2", 5), entrant("1", 5), entrant("3", 5)]);

        assert_eq!(
            patch.ops,
            vec![RowOp::Move {
                key: RowKey::entrant("2"),
                index: 0,
            }]
        );
        assert_eq!(keys(&table), vec!["id:2", "id:1", "id:3"]);
    }

    #[test]
    fn enabled_toggle_does_not_touch_order() {
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 16);
        table.reconcile(&[entrant("1", 0), entrant("2", 0)]);

        let mut disabled = entrant("1", 0);
        disabled.enabled = Some(false);
        let patch = table.reconcile(&[disabled, entrant("2", 0)]);

        assert_eq!(
            patch.ops,
            vec![RowOp::Enable {
                key: RowKey::entrant("1"),
                enabled: false,
            }]
        );
    }

    #[test]
    fn pads_to_viewport() {
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 4);
        assert_eq!(table.placeholders(), 4);

        let patch = table.reconcile(&[entrant("1", 0)]);
        assert_eq!(patch.placeholders, Some(3));

        let many: Vec<_> = (1..=6).map(|i| entrant(&i.to_string(), 0)).collect();
        let patch = table.reconcile(&many);
        assert_eq!(patch.placeholders, Some(0));

        let patch = table.reconcile::<EntrantRow>(&[]);
        assert_eq!(patch.placeholders, Some(4));
        assert_eq!(
            patch
                .ops
                .iter()
                .filter(|op| matches!(op, RowOp::Remove { .. }))
                .count(),
            6
        );
        assert!(table.is_empty());
    }

    #[test]
    fn rows_without_ids_use_composite_keys() {
        let row = EntrantRow {
            number: Some("9".into()),
            name: Some("Lin".into()),
            ..Default::default()
        };
        assert_eq!(row.key(3), RowKey::composite(Some("9"), Some("Lin"), 3));
    }

    #[test]
    fn duplicate_ids_do_not_collapse() {
        let mut table = RowReconciler::new(&STANDINGS_COLUMNS, 16);
        table.reconcile(&[entrant("1", 0), entrant("1", 0)]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn seen_tags_sort_enabled_then_reads_then_number() {
        let tag = |number: &str, reads: u32, enabled: bool| SeenTagRow {
            tag: Some(format!("T{number}")),
            number: Some(number.to_string()),
            reads: Some(reads),
            enabled: Some(enabled),
            ..Default::default()
        };
        let rows = [
            tag("30", 9, false),
            tag("12", 4, true),
            tag("7", 4, true),
            tag("2", 11, true),
        ];

        let mut table = RowReconciler::new(&SEEN_COLUMNS, 16);
        table.reconcile_sorted(&rows, seen_tag_order);

        assert_eq!(keys(&table), vec!["tag:T2", "tag:T7", "tag:T12", "tag:T30"]);
    }
}
