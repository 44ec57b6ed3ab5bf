//! Record merging: propagate attribute-row fields onto image rows.

use crate::spec::{EnumCellValue, SpecFieldMapping, SpecRow};

/// Build the row emitted for one image of an inspection.
///
/// Every cell except the image description and image URL columns is taken
/// from `attribute_row`; those two columns keep the image row's own values.
/// Cells missing on either side read as blank. Without an attribute row the
/// image row is returned unchanged.
pub fn merge_rows(
    attribute_row: Option<&SpecRow>,
    image_row: &SpecRow,
    mapping: &SpecFieldMapping,
) -> SpecRow {
    let Some(attribute_row) = attribute_row else {
        return image_row.clone();
    };

    let set_cols_image = mapping.image_columns();
    let n_width = usize::max(attribute_row.len(), image_row.len());
    (0..n_width)
        .map(|idx_col| {
            let row_src = if set_cols_image.contains(&idx_col) {
                image_row
            } else {
                attribute_row
            };
            row_src.get(idx_col).cloned().unwrap_or(EnumCellValue::None)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_field_mapping;
    use crate::spec::{EnumField, EnumReportVariant};
    use crate::test_support::make_row;

    #[test]
    fn absent_attribute_row_passes_image_row_through() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let image_row = make_row("X", "", "http://img/1", "Depot", "scratch");
        assert_eq!(merge_rows(None, &image_row, &mapping), image_row);
    }

    #[test]
    fn merge_keeps_image_fields_and_takes_the_rest() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let attribute_row = make_row("X", "", "", "Depot 3", "should not leak");
        let image_row = make_row("Y", "X", "http://img/1", "", "door hinge");

        let merged = merge_rows(Some(&attribute_row), &image_row, &mapping);

        assert_eq!(mapping.text(&merged, EnumField::Location), "Depot 3");
        assert_eq!(mapping.text(&merged, EnumField::InspectionId), "X");
        assert_eq!(mapping.text(&merged, EnumField::ImageInspectionId), "");
        assert_eq!(mapping.text(&merged, EnumField::ImageUrl), "http://img/1");
        assert_eq!(mapping.text(&merged, EnumField::ImageDescription), "door hinge");
        assert_eq!(mapping.text(&image_row, EnumField::Location), "");
    }

    #[test]
    fn merge_spans_the_wider_row_and_blanks_missing_cells() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Functional);
        let attribute_row = SpecRow::from_texts(&["a0", "X", "a2"]);
        let image_row = make_row("X", "", "http://img/1", "", "cap");

        let merged = merge_rows(Some(&attribute_row), &image_row, &mapping);

        assert_eq!(merged.len(), image_row.len());
        assert_eq!(merged.text_at(0), "a0");
        assert_eq!(merged.text_at(2), "a2");
        assert_eq!(merged.get(7), Some(&EnumCellValue::None));
        assert_eq!(mapping.text(&merged, EnumField::ImageDescription), "cap");
    }
}
