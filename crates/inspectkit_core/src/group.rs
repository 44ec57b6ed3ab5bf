//! Inspection grouping: partition a batch into per-inspection groups.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::spec::{
    EnumAttributeRowPolicy, EnumField, InspectionKey, SpecFieldMapping, SpecGrouping,
    SpecGroupingReport, SpecInspectionGroup, SpecRow,
};

/// Resolve the grouping key of `row`.
///
/// A non-empty image-linked identifier wins over the row's own inspection
/// identifier; both are trimmed and blank values resolve to `""`.
pub fn resolve_inspection_key(row: &SpecRow, mapping: &SpecFieldMapping) -> InspectionKey {
    let c_image_id = mapping.trimmed_text(row, EnumField::ImageInspectionId);
    if !c_image_id.is_empty() {
        return InspectionKey::new(&c_image_id);
    }
    InspectionKey::new(&mapping.trimmed_text(row, EnumField::InspectionId))
}

/// `true` when `row` carries a non-blank image URL.
pub fn is_image_row(row: &SpecRow, mapping: &SpecFieldMapping) -> bool {
    !mapping.trimmed_text(row, EnumField::ImageUrl).is_empty()
}

/// Group `rows` by inspection key, preserving first-seen key order.
///
/// Image rows are appended to their group in source order. Non-image rows
/// compete for the group's single attribute row under `rule_attribute_row`;
/// rows the policy drops are counted and reported as warnings.
pub fn group_rows<'a>(
    rows: &'a [SpecRow],
    mapping: &SpecFieldMapping,
    rule_attribute_row: EnumAttributeRowPolicy,
) -> SpecGrouping<'a> {
    let mut l_groups: Vec<SpecInspectionGroup<'a>> = Vec::new();
    let mut dict_idx_by_key: HashMap<InspectionKey, usize> = HashMap::new();
    let mut report = SpecGroupingReport::default();

    for (n_idx_row, row) in rows.iter().enumerate() {
        report.cnt_rows += 1;
        let key = resolve_inspection_key(row, mapping);
        let n_idx_group = *dict_idx_by_key.entry(key.clone()).or_insert_with(|| {
            l_groups.push(SpecInspectionGroup::new(key.clone()));
            l_groups.len() - 1
        });
        let group = &mut l_groups[n_idx_group];

        if is_image_row(row, mapping) {
            report.cnt_image_rows += 1;
            group.image_rows.push(row);
            continue;
        }

        let if_accept = match rule_attribute_row {
            EnumAttributeRowPolicy::FirstBeforeImages => {
                group.attribute_row.is_none() && group.image_rows.is_empty()
            }
            EnumAttributeRowPolicy::LastBeforeImages => group.image_rows.is_empty(),
            EnumAttributeRowPolicy::LastWins => true,
        };
        if if_accept {
            group.attribute_row = Some(row);
            continue;
        }

        report.cnt_attribute_rows_ignored += 1;
        let c_reason = if group.image_rows.is_empty() {
            "an attribute row was already taken"
        } else {
            "image rows already exist"
        };
        warn!(
            row = n_idx_row,
            key = %group.key,
            "ignoring non-image row: {c_reason}"
        );
        report.warn(format!(
            "Row {n_idx_row} ignored for inspection {:?}: {c_reason}.",
            group.key.as_str()
        ));
    }

    debug!(
        rows = report.cnt_rows,
        groups = l_groups.len(),
        image_rows = report.cnt_image_rows,
        "grouped batch"
    );

    SpecGrouping {
        groups: l_groups,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_field_mapping;
    use crate::spec::{EnumCellValue, EnumReportVariant};
    use crate::test_support::make_row;

    fn keys(grouping: &SpecGrouping<'_>) -> Vec<String> {
        grouping
            .groups
            .iter()
            .map(|group| group.key.as_str().to_string())
            .collect()
    }

    #[test]
    fn empty_batch_yields_no_groups() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let grouping = group_rows(&[], &mapping, EnumAttributeRowPolicy::default());
        assert!(grouping.groups.is_empty());
        assert_eq!(grouping.report, SpecGroupingReport::default());
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let rows = vec![
            make_row("B", "", "", "b-attr", ""),
            make_row("A", "", "", "a-attr", ""),
            make_row("B", "", "http://img/b1", "", "b1"),
            make_row("C", "", "", "c-attr", ""),
        ];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::default());
        assert_eq!(keys(&grouping), vec!["B", "A", "C"]);
        assert_eq!(grouping.groups[0].image_rows, vec![&rows[2]]);
        assert_eq!(grouping.groups[0].attribute_row, Some(&rows[0]));
    }

    #[test]
    fn image_linked_id_overrides_own_id() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let rows = vec![
            make_row("X", "", "", "attr", ""),
            make_row("Y", " X ", "http://img/1", "", "photo"),
        ];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::default());
        assert_eq!(keys(&grouping), vec!["X"]);
        assert_eq!(grouping.groups[0].image_rows.len(), 1);
    }

    #[test]
    fn blank_identifiers_group_under_empty_key() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let rows = vec![make_row("  ", "", "", "a", ""), make_row("", "", "", "b", "")];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::LastWins);
        assert_eq!(keys(&grouping), vec![""]);
        assert_eq!(grouping.groups[0].attribute_row, Some(&rows[1]));
    }

    #[test]
    fn numeric_identifiers_match_their_text_form() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let mut row_numeric = make_row("", "", "", "attr", "");
        let mut l_cells = row_numeric.cells().to_vec();
        l_cells[1] = EnumCellValue::Number(1042.0);
        row_numeric = SpecRow::new(l_cells);
        let rows = vec![row_numeric, make_row("1042", "", "http://img/1", "", "")];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::default());
        assert_eq!(keys(&grouping), vec!["1042"]);
    }

    #[test]
    fn first_before_images_ignores_later_attribute_rows() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let rows = vec![
            make_row("X", "", "", "first", ""),
            make_row("X", "", "", "second", ""),
            make_row("X", "", "http://img/1", "", ""),
            make_row("X", "", "", "late", ""),
        ];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::FirstBeforeImages);
        assert_eq!(grouping.groups[0].attribute_row, Some(&rows[0]));
        assert_eq!(grouping.report.cnt_attribute_rows_ignored, 2);
        assert_eq!(grouping.report.warnings.len(), 2);
        assert!(grouping.report.warnings[1].contains("image rows already exist"));
    }

    #[test]
    fn last_before_images_overwrites_until_first_image() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let rows = vec![
            make_row("X", "", "", "first", ""),
            make_row("X", "", "", "second", ""),
            make_row("X", "", "http://img/1", "", ""),
            make_row("X", "", "", "late", ""),
        ];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::LastBeforeImages);
        assert_eq!(grouping.groups[0].attribute_row, Some(&rows[1]));
        assert_eq!(grouping.report.cnt_attribute_rows_ignored, 1);
    }

    #[test]
    fn last_wins_always_overwrites() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let rows = vec![
            make_row("X", "", "", "first", ""),
            make_row("X", "", "http://img/1", "", ""),
            make_row("X", "", "", "late", ""),
        ];
        let grouping = group_rows(&rows, &mapping, EnumAttributeRowPolicy::LastWins);
        assert_eq!(grouping.groups[0].attribute_row, Some(&rows[2]));
        assert_eq!(grouping.report.cnt_attribute_rows_ignored, 0);
        assert!(grouping.report.warnings.is_empty());
    }
}
