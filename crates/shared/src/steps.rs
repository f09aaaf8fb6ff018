use crate::domain::ProductTag;

/// Keys are agreed by convention between producer and consumer steps. A
/// typo'd key reads as "record not found", never as an error.
pub const LAST_ISSUED_INVOICE: &str = "workflow/last_issued_invoice";
pub const LAST_GENERATED_EWB: &str = "workflow/last_generated_ewb";
pub const LAST_CONSOLIDATED_EWB: &str = "workflow/last_consolidated_ewb";
pub const LAST_MULTI_VEHICLE_EWB: &str = "workflow/last_multi_vehicle_ewb";
pub const LAST_UPLOADED_BATCH: &str = "workflow/last_uploaded_batch";

pub fn credential_key(product: ProductTag) -> String {
    format!("credential/{product}")
}

/// Document-lifecycle steps that persist a workflow record on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    IssueInvoice,
    EwbFromInvoice,
    GenerateEwb,
    ConsolidateEwb,
    SplitMultiVehicle,
    UploadBatch,
}

impl StepKind {
    pub fn product(self) -> ProductTag {
        match self {
            StepKind::IssueInvoice | StepKind::EwbFromInvoice | StepKind::UploadBatch => {
                ProductTag::Invoice
            }
            StepKind::GenerateEwb | StepKind::ConsolidateEwb | StepKind::SplitMultiVehicle => {
                ProductTag::Waybill
            }
        }
    }

    pub fn operation_id(self) -> &'static str {
        match self {
            StepKind::IssueInvoice => "issue",
            StepKind::EwbFromInvoice => "ewb-by-irn",
            StepKind::GenerateEwb => "generate",
            StepKind::ConsolidateEwb => "consolidate",
            StepKind::SplitMultiVehicle => "multi-vehicle",
            StepKind::UploadBatch => "upload",
        }
    }

    /// Both e-way bill producers write the same key: downstream consolidation
    /// does not care which product line generated the bill.
    pub fn record_key(self) -> &'static str {
        match self {
            StepKind::IssueInvoice => LAST_ISSUED_INVOICE,
            StepKind::EwbFromInvoice | StepKind::GenerateEwb => LAST_GENERATED_EWB,
            StepKind::ConsolidateEwb => LAST_CONSOLIDATED_EWB,
            StepKind::SplitMultiVehicle => LAST_MULTI_VEHICLE_EWB,
            StepKind::UploadBatch => LAST_UPLOADED_BATCH,
        }
    }

    /// The explicit field subset this step persists for downstream steps,
    /// never the whole response.
    pub fn persisted_fields(self) -> &'static [&'static str] {
        match self {
            StepKind::IssueInvoice => &["irn", "ackNo", "ackDt", "docNo", "docDt", "ewbNo"],
            StepKind::EwbFromInvoice => &["ewbNo", "ewbDt", "validUpto", "irn"],
            StepKind::GenerateEwb => &["ewbNo", "ewbDt", "validUpto", "vehicleNo"],
            StepKind::ConsolidateEwb => &["cEwbNo", "cEwbDt", "ewbNo"],
            StepKind::SplitMultiVehicle => &["groupNo", "ewbNo", "vehicleNo"],
            StepKind::UploadBatch => &["batchId", "docCount"],
        }
    }
}
