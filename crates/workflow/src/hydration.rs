use shared::{
    domain::ProductTag,
    steps::{StepKind, LAST_GENERATED_EWB, LAST_ISSUED_INVOICE, LAST_MULTI_VEHICLE_EWB},
};
use storage::{CredentialField, FallbackChain};

/// One row of a step's hydration table. Required fields that resolve empty
/// fail locally, before any upstream round trip.
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub chain: FallbackChain,
}

impl FieldRule {
    fn required(field: &'static str, chain: FallbackChain) -> Self {
        Self {
            field,
            required: true,
            chain,
        }
    }

    fn optional(field: &'static str, chain: FallbackChain) -> Self {
        Self {
            field,
            required: false,
            chain,
        }
    }
}

/// The per-step fallback tables. One canonical name per concept: a field is
/// always `gstin`, never a per-screen alias.
pub fn rules_for(step: StepKind) -> Vec<FieldRule> {
    match step {
        StepKind::IssueInvoice => vec![
            FieldRule::required("docNo", FallbackChain::empty_default()),
            FieldRule::required("docDt", FallbackChain::empty_default()),
            FieldRule::required(
                "gstin",
                FallbackChain::empty_default()
                    .then_credential(ProductTag::Invoice, CredentialField::CompanyId),
            ),
            FieldRule::optional("ewbNo", FallbackChain::empty_default()),
        ],
        StepKind::EwbFromInvoice => vec![
            FieldRule::required(
                "irn",
                FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "irn"),
            ),
            FieldRule::optional(
                "docNo",
                FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "docNo"),
            ),
            FieldRule::optional("transporterId", FallbackChain::empty_default()),
            FieldRule::optional("vehicleNo", FallbackChain::empty_default()),
        ],
        StepKind::GenerateEwb => vec![
            FieldRule::required(
                "docNo",
                FallbackChain::empty_default().then_record(LAST_ISSUED_INVOICE, "docNo"),
            ),
            FieldRule::required(
                "gstin",
                FallbackChain::empty_default()
                    .then_credential(ProductTag::Waybill, CredentialField::CompanyId),
            ),
            FieldRule::optional("vehicleNo", FallbackChain::empty_default()),
            FieldRule::optional("transMode", FallbackChain::new("1")),
        ],
        StepKind::ConsolidateEwb => vec![
            FieldRule::required(
                "ewbNo",
                FallbackChain::empty_default().then_record(LAST_GENERATED_EWB, "ewbNo"),
            ),
            FieldRule::required(
                "vehicleNo",
                FallbackChain::empty_default().then_record(LAST_GENERATED_EWB, "vehicleNo"),
            ),
            FieldRule::optional("fromPlace", FallbackChain::empty_default()),
            FieldRule::optional("fromState", FallbackChain::empty_default()),
        ],
        StepKind::SplitMultiVehicle => vec![
            FieldRule::required(
                "ewbNo",
                FallbackChain::empty_default().then_record(LAST_GENERATED_EWB, "ewbNo"),
            ),
            FieldRule::optional(
                "groupNo",
                FallbackChain::empty_default().then_record(LAST_MULTI_VEHICLE_EWB, "groupNo"),
            ),
            FieldRule::optional("fromPlace", FallbackChain::empty_default()),
            FieldRule::optional("toPlace", FallbackChain::empty_default()),
            FieldRule::optional("totalQuantity", FallbackChain::empty_default()),
        ],
        StepKind::UploadBatch => vec![FieldRule::required(
            "docs",
            FallbackChain::new(serde_json::Value::Array(Vec::new())),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_step_has_rules_and_at_least_one_required_field() {
        for step in [
            StepKind::IssueInvoice,
            StepKind::EwbFromInvoice,
            StepKind::GenerateEwb,
            StepKind::ConsolidateEwb,
            StepKind::SplitMultiVehicle,
            StepKind::UploadBatch,
        ] {
            let rules = rules_for(step);
            assert!(!rules.is_empty(), "{step:?} has no hydration rules");
            assert!(rules.iter().any(|r| r.required), "{step:?} has no required field");
        }
    }

    #[test]
    fn continuation_steps_chain_to_their_upstream_record() {
        let rules = rules_for(StepKind::EwbFromInvoice);
        let irn = rules.iter().find(|r| r.field == "irn").expect("irn rule");
        assert!(irn
            .chain
            .sources
            .iter()
            .any(|s| matches!(s, storage::FieldSource::Record { key, field }
                if key == LAST_ISSUED_INVOICE && field == "irn")));
    }
}
