//! Report assembly: grouping, merge decision and numbering for one batch.

use tracing::{debug, info};

use crate::group::group_rows;
use crate::merge::merge_rows;
use crate::sequence::ItemSequencer;
use crate::spec::{
    EnumAttributeRowPolicy, EnumBatchOutcome, EnumCellValue, ReportError, SpecAssembly,
    SpecBatchResult, SpecEmission, SpecFieldMapping, SpecGroupingReport, SpecInspectionGroup,
};
use crate::util::parse_start_item_no;
use crate::SpecRow;

/// Turn grouped rows into numbered report lines.
///
/// - A group without image rows emits its attribute row (if any) once.
/// - A group with image rows emits one merged line per image row, in source
///   order; its attribute row is consumed by the merges and never emitted on
///   its own.
///
/// Numbering starts at `start_item_no` and is contiguous across groups.
pub fn assemble_groups(
    groups: &[SpecInspectionGroup<'_>],
    start_item_no: u32,
    mapping: &SpecFieldMapping,
) -> SpecAssembly {
    let mut sequencer = ItemSequencer::new(start_item_no);
    let mut l_emissions = Vec::new();

    for group in groups {
        if group.image_rows.is_empty() {
            let Some(attribute_row) = group.attribute_row else {
                continue;
            };
            l_emissions.push(SpecEmission {
                item_no: sequencer.advance(),
                row: attribute_row.clone(),
            });
            continue;
        }

        for image_row in &group.image_rows {
            l_emissions.push(SpecEmission {
                item_no: sequencer.advance(),
                row: merge_rows(group.attribute_row, image_row, mapping),
            });
        }
        debug!(
            key = %group.key,
            images = group.image_rows.len(),
            merged = group.attribute_row.is_some(),
            "assembled image group"
        );
    }

    SpecAssembly {
        start_item_no: sequencer.start_item_no(),
        emissions: l_emissions,
    }
}

/// Process one source batch end to end.
///
/// Checks run in this order: empty batch (no-op), start item number
/// ([`ReportError::MissingWatermark`]), then grouping and assembly. A batch
/// that yields no lines is [`EnumBatchOutcome::NoEmittableRows`]; callers
/// advance their watermark only on [`EnumBatchOutcome::Emitted`].
pub fn process_batch(
    rows: &[SpecRow],
    start_item_no: &EnumCellValue,
    mapping: &SpecFieldMapping,
    rule_attribute_row: EnumAttributeRowPolicy,
) -> Result<SpecBatchResult, ReportError> {
    if rows.is_empty() {
        info!("no data rows to process");
        return Ok(SpecBatchResult {
            outcome: EnumBatchOutcome::EmptyBatch,
            grouping: SpecGroupingReport::default(),
        });
    }

    let n_start_item_no = parse_start_item_no(start_item_no)?;
    let grouping = group_rows(rows, mapping, rule_attribute_row);
    let assembly = assemble_groups(&grouping.groups, n_start_item_no, mapping);

    let outcome = match assembly.end_item_no() {
        None => {
            info!(rows = rows.len(), "no data rows to process for report generation");
            EnumBatchOutcome::NoEmittableRows
        }
        Some(n_end_item_no) => {
            info!(
                rows = rows.len(),
                groups = grouping.groups.len(),
                start_item_no = n_start_item_no,
                end_item_no = n_end_item_no,
                "batch assembled"
            );
            EnumBatchOutcome::Emitted(assembly)
        }
    };

    Ok(SpecBatchResult {
        outcome,
        grouping: grouping.report,
    })
}
