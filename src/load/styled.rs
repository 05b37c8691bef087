// Bordered text rendering of a dataset
// Author: Gabriel Demetrios Lafis

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};

use crate::data::DataSet;

/// Render the whole table with a bold header row; numeric columns are
/// right-aligned
pub fn render_table(data: &DataSet) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Disabled)
        .force_no_tty()
        .set_header(
            data.schema
                .fields
                .iter()
                .map(|field| Cell::new(&field.name).add_attribute(Attribute::Bold)),
        );

    for row in &data.data {
        table.add_row(row.values.iter().map(|value| Cell::new(value.to_string())));
    }

    for (idx, field) in data.schema.fields.iter().enumerate() {
        if field.data_type.is_numeric() {
            if let Some(column) = table.column_mut(idx) {
                column.set_cell_alignment(CellAlignment::Right);
            }
        }
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Row, SchemaBuilder, Value};

    #[test]
    fn test_render_contains_header_and_cells() {
        let schema = SchemaBuilder::new().add_string("name", true).add_float("score", true).build();
        let data = DataSet::with_rows(
            schema,
            vec![
                Row::new(vec!["Ana".into(), Value::Float(9.5)]),
                Row::new(vec!["Bo".into(), Value::Null]),
            ],
        )
        .unwrap();

        let text = render_table(&data);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].contains("name") && lines[1].contains("score"));
        assert!(text.contains("9.5"));
        assert!(text.contains("Bo"));
        assert!(!text.contains('\u{1b}'));
    }
}
