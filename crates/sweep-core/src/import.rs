//! Table import
//!
//! A table is a header row followed by value rows, all plain strings.
//! Headers name member classes by full display name, so a header such as
//! `Timing \ Delay` selects every member with that display name under the
//! loop. An optional leading `Enabled` column carries the per-row enabled
//! flag. Unknown or ambiguous headers and unparsable cells are hard errors.

use crate::error::{ImportError, SweepError};
use crate::member::{EquivalenceKey, Member};
use crate::param::SweepParam;
use crate::registry::TypeRegistry;
use crate::resolver;
use crate::row::{SweepRow, SweepRowCollection};
use crate::sweep::{ParameterSweep, SweepColumn, TableSweep};
use crate::tree::{StepId, StepTree};
use crate::types::TypeDescriptor;
use crate::value::Value;
use indexmap::IndexMap;

/// Header of the optional enabled-flag column
pub const ENABLED_HEADER: &str = "Enabled";

/// One imported column bound to a member class
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedColumn {
    /// Header text as written
    pub header: String,
    /// Class the header resolved to
    pub key: EquivalenceKey,
    /// Live members of the class
    pub members: Vec<Member>,
}

/// One imported value row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRow {
    /// Enabled flag, `true` without an enabled column
    pub enabled: bool,
    /// One value per column
    pub values: Vec<Value>,
}

/// Parsed table, columns in header order
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTable {
    /// Value columns
    pub columns: Vec<ImportedColumn>,
    /// Value rows
    pub rows: Vec<ImportedRow>,
}

impl ImportedTable {
    /// Values of column `index`, top to bottom
    #[must_use]
    pub fn column_values(&self, index: usize) -> Vec<Value> {
        self.rows
            .iter()
            .filter_map(|row| row.values.get(index).cloned())
            .collect()
    }

    /// Enabled flags, top to bottom
    #[must_use]
    pub fn enabled_flags(&self) -> Vec<bool> {
        self.rows.iter().map(|row| row.enabled).collect()
    }
}

/// Map headers onto `available` classes and convert every cell
///
/// # Errors
/// Returns [`ImportError`] for an empty table, unknown, ambiguous or
/// duplicate headers, rows of the wrong width and cells that do not parse
/// as their column type.
pub fn parse_table(
    table: &[Vec<String>],
    available: &IndexMap<EquivalenceKey, Vec<Member>>,
    registry: &TypeRegistry,
) -> Result<ImportedTable, ImportError> {
    let (header, data) = table.split_first().ok_or(ImportError::EmptyTable)?;
    let has_enabled = header
        .first()
        .is_some_and(|h| h.trim().eq_ignore_ascii_case(ENABLED_HEADER));
    let offset = usize::from(has_enabled);

    let mut columns: Vec<ImportedColumn> = Vec::with_capacity(header.len() - offset);
    for (column, text) in header.iter().enumerate().skip(offset) {
        let (key, members) = match_header(column, text, available)?;
        if columns.iter().any(|c| c.key == key) {
            return Err(ImportError::DuplicateHeader {
                column,
                header: text.clone(),
            });
        }
        columns.push(ImportedColumn {
            header: text.clone(),
            key,
            members,
        });
    }

    let mut rows = Vec::with_capacity(data.len());
    for (i, cells) in data.iter().enumerate() {
        let row = i + 1;
        if cells.len() != header.len() {
            return Err(ImportError::RaggedRow {
                row,
                expected: header.len(),
                actual: cells.len(),
            });
        }
        let enabled = if has_enabled {
            match TypeDescriptor::Bool.parse_text(&cells[0], registry) {
                Ok(Value::Bool(flag)) => flag,
                Ok(_) => true,
                Err(source) => {
                    return Err(ImportError::InvalidCell {
                        row,
                        header: header[0].clone(),
                        source,
                    })
                }
            }
        } else {
            true
        };
        let mut values = Vec::with_capacity(columns.len());
        for (column, cell) in columns.iter().zip(&cells[offset..]) {
            let value = column
                .key
                .value_type
                .parse_text(cell, registry)
                .map_err(|source| ImportError::InvalidCell {
                    row,
                    header: column.header.clone(),
                    source,
                })?;
            values.push(value);
        }
        rows.push(ImportedRow { enabled, values });
    }

    tracing::debug!(columns = columns.len(), rows = rows.len(), has_enabled, "table parsed");
    Ok(ImportedTable { columns, rows })
}

fn match_header(
    column: usize,
    header: &str,
    available: &IndexMap<EquivalenceKey, Vec<Member>>,
) -> Result<(EquivalenceKey, Vec<Member>), ImportError> {
    let wanted = header.trim();
    let mut candidates: Vec<(&EquivalenceKey, &Vec<Member>)> = available
        .iter()
        .filter(|(key, _)| key.display_name == wanted)
        .collect();
    if candidates.is_empty() {
        candidates = available
            .iter()
            .filter(|(key, _)| key.display_name.eq_ignore_ascii_case(wanted))
            .collect();
    }
    match candidates.as_slice() {
        [] => Err(ImportError::UnknownHeader {
            column,
            header: header.to_string(),
        }),
        [(key, members)] => Ok(((*key).clone(), (*members).clone())),
        many => Err(ImportError::AmbiguousHeader {
            column,
            header: header.to_string(),
            candidates: many.iter().map(|(key, _)| key.to_string()).collect(),
        }),
    }
}

/// Replace the axes of the parameter sweep at `loop_id` with `table`
///
/// Returns the number of imported points. The sweep is left untouched on
/// error.
///
/// # Errors
/// Returns [`SweepError::Import`] for a malformed table, or a tree or
/// construction error.
pub fn import_parameters(tree: &mut StepTree, loop_id: StepId, table: &[Vec<String>]) -> Result<usize, SweepError> {
    tree.step_as::<ParameterSweep>(loop_id)?;
    let available = resolver::resolve(tree, loop_id);
    let parsed = parse_table(table, &available, tree.registry())?;

    let enabled = parsed.enabled_flags();
    let mut params = Vec::with_capacity(parsed.columns.len());
    for (index, column) in parsed.columns.iter().enumerate() {
        params.push(SweepParam::restore(
            column.key.display_name.clone(),
            column.members.clone(),
            parsed.column_values(index),
            enabled.clone(),
        )?);
    }

    let points = parsed.rows.len();
    tree.step_as_mut::<ParameterSweep>(loop_id)?
        .replace_params(params)?;
    tracing::info!(step = %loop_id, axes = parsed.columns.len(), points, "parameters imported");
    Ok(points)
}

/// Replace the columns and rows of the table sweep at `loop_id`
///
/// Returns the number of imported rows.
///
/// # Errors
/// See [`import_parameters`].
pub fn import_rows(tree: &mut StepTree, loop_id: StepId, table: &[Vec<String>]) -> Result<usize, SweepError> {
    tree.step_as::<TableSweep>(loop_id)?;
    let available = resolver::resolve(tree, loop_id);
    let parsed = parse_table(table, &available, tree.registry())?;

    let columns = parsed
        .columns
        .iter()
        .map(|c| SweepColumn::new(c.key.display_name.clone(), c.members.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    let mut rows = SweepRowCollection::new();
    for imported in &parsed.rows {
        let mut row = SweepRow::new().with_enabled(imported.enabled);
        for (column, value) in parsed.columns.iter().zip(&imported.values) {
            row = row.with_value(column.key.display_name.clone(), value.clone());
        }
        rows.push(row);
    }

    let count = rows.len();
    tree.step_as_mut::<TableSweep>(loop_id)?.replace(columns, rows);
    tracing::info!(step = %loop_id, columns = parsed.columns.len(), rows = count, "rows imported");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::step::{PropertyStep, StepType};
    use pretty_assertions::assert_eq;

    fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| (*c).to_string()).collect())
            .collect()
    }

    fn tree_with(root_step: impl crate::step::Step + 'static) -> (StepTree, StepId) {
        let a = StepType::builder("A")
            .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
            .member(MemberDescriptor::new("gain", TypeDescriptor::Float, Value::Float(0.0)))
            .build();
        let b = StepType::builder("B")
            .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
            .member(MemberDescriptor::new("gain", TypeDescriptor::Text, Value::Text(String::new())))
            .build();
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("loop", root_step).unwrap();
        tree.add_child(root, "a", PropertyStep::new(a)).unwrap();
        tree.add_child(root, "b", PropertyStep::new(b)).unwrap();
        (tree, root)
    }

    #[test]
    fn parameters_with_enabled_column() {
        let (mut tree, root) = tree_with(ParameterSweep::new());
        let points = import_parameters(
            &mut tree,
            root,
            &table(&[&["enabled", "x"], &["yes", "10"], &["no", "20"], &["1", "30"]]),
        )
        .unwrap();
        assert_eq!(points, 3);

        let sweep = tree.step_as::<ParameterSweep>(root).unwrap();
        let axis = sweep.param("x").unwrap();
        assert_eq!(axis.members().len(), 2);
        assert_eq!(axis.values(), &[Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(sweep.enabled_indices(), vec![0, 2]);
    }

    #[test]
    fn rows_into_table_sweep() {
        let (mut tree, root) = tree_with(TableSweep::new());
        let count = import_rows(&mut tree, root, &table(&[&["x"], &["5"], &["6"]])).unwrap();
        assert_eq!(count, 2);
        let sweep = tree.step_as::<TableSweep>(root).unwrap();
        assert_eq!(sweep.columns().len(), 1);
        assert_eq!(sweep.rows().get(1).unwrap().cached("x"), Some(&Value::Int(6)));
        assert_eq!(sweep.rows().get(1).unwrap().owner(), Some(root));
    }

    #[test]
    fn header_errors() {
        let (tree, root) = tree_with(ParameterSweep::new());
        let available = resolver::resolve(&tree, root);
        let registry = tree.registry();

        let err = parse_table(&table(&[&["nope"]]), &available, registry).unwrap_err();
        assert_eq!(
            err.to_string(),
            "column 0: unrecognized header 'nope'"
        );

        let err = parse_table(&table(&[&["gain"], &["1"]]), &available, registry).unwrap_err();
        assert!(matches!(err, ImportError::AmbiguousHeader { column: 0, .. }));

        let err = parse_table(&table(&[&["x", "X"]]), &available, registry).unwrap_err();
        assert!(matches!(err, ImportError::DuplicateHeader { column: 1, .. }));

        assert!(matches!(
            parse_table(&[], &available, registry),
            Err(ImportError::EmptyTable)
        ));
    }

    #[test]
    fn cell_errors_name_row_and_header() {
        let (tree, root) = tree_with(ParameterSweep::new());
        let available = resolver::resolve(&tree, root);
        let err = parse_table(&table(&[&["x"], &["1"], &["two"]]), &available, tree.registry()).unwrap_err();
        assert!(matches!(err, ImportError::InvalidCell { row: 2, ref header, .. } if header == "x"));

        let err = parse_table(&table(&[&["x"], &["1", "2"]]), &available, tree.registry()).unwrap_err();
        assert_eq!(
            err,
            ImportError::RaggedRow {
                row: 1,
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn failed_import_leaves_sweep_untouched() {
        let (mut tree, root) = tree_with(ParameterSweep::new());
        import_parameters(&mut tree, root, &table(&[&["x"], &["1"]])).unwrap();
        assert!(import_parameters(&mut tree, root, &table(&[&["x"], &["bad"]])).is_err());
        let sweep = tree.step_as::<ParameterSweep>(root).unwrap();
        assert_eq!(sweep.param("x").unwrap().values(), &[Value::Int(1)]);
    }
}
