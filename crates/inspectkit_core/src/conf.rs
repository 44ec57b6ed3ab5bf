//! Core constants and default field mapping presets.

use std::collections::BTreeMap;

use crate::spec::{EnumField, EnumReportVariant, SpecFieldMapping};

/// Maximum number of source rows consumed per batch.
pub const N_BATCH_ROW_SIZE_DEFAULT: usize = 200;
/// Train number used when the batch does not carry one.
pub const C_TRAIN_NO_UNKNOWN: &str = "Unknown_Train_No";

/// Default 1-based sheet columns shared by both variants.
const TUP_DEFAULT_COLUMNS_1BASED: [(EnumField, usize); 15] = [
    (EnumField::InspectionId, 2),
    (EnumField::UserName, 5),
    (EnumField::TrainNo, 7),
    (EnumField::Location, 8),
    (EnumField::CarBody, 11),
    (EnumField::SectionName, 13),
    (EnumField::SubsystemName, 15),
    (EnumField::SerialNumber, 16),
    (EnumField::Subcomponent, 18),
    (EnumField::Condition, 19),
    (EnumField::DefectType, 20),
    (EnumField::Remarks, 21),
    (EnumField::ImageInspectionId, 24),
    (EnumField::ImageDescription, 26),
    (EnumField::ImageUrl, 27),
];

/// Visual-only sub-subcomponent column (1-based).
const N_COL_SUB_SUBCOMPONENT_1BASED: usize = 22;

/// Default zero-based columns for `variant`.
pub fn derive_default_field_columns(variant: EnumReportVariant) -> BTreeMap<EnumField, usize> {
    let mut dict_col_by_field: BTreeMap<EnumField, usize> = TUP_DEFAULT_COLUMNS_1BASED
        .iter()
        .map(|(field, n_col)| (*field, n_col - 1))
        .collect();
    if variant == EnumReportVariant::Visual {
        dict_col_by_field.insert(EnumField::SubSubcomponent, N_COL_SUB_SUBCOMPONENT_1BASED - 1);
    }
    dict_col_by_field
}

/// Build the default mapping for `variant`.
pub fn derive_default_field_mapping(variant: EnumReportVariant) -> SpecFieldMapping {
    SpecFieldMapping::new_unchecked(variant, derive_default_field_columns(variant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mappings_pass_validation() {
        for variant in [EnumReportVariant::Visual, EnumReportVariant::Functional] {
            let mapping = SpecFieldMapping::new(variant, derive_default_field_columns(variant));
            assert_eq!(mapping, Ok(derive_default_field_mapping(variant)));
        }
    }

    #[test]
    fn default_image_columns_are_z_and_aa() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        assert_eq!(mapping.column(EnumField::ImageDescription), Some(25));
        assert_eq!(mapping.column(EnumField::ImageUrl), Some(26));
        assert_eq!(mapping.column(EnumField::SubSubcomponent), Some(21));
        assert_eq!(
            derive_default_field_mapping(EnumReportVariant::Functional)
                .column(EnumField::SubSubcomponent),
            None
        );
    }
}
