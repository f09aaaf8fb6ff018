use crate::domain::ProductTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Binary,
}

/// One entry in the static operation table.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub id: &'static str,
    pub product: ProductTag,
    pub method: HttpMethod,
    pub upstream_path: &'static str,
    pub response_kind: ResponseKind,
    /// Auth operations require `x-auth-token` and `companyid` headers and are
    /// rejected locally when either is missing.
    pub requires_auth: bool,
}

pub const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        id: "login",
        product: ProductTag::Invoice,
        method: HttpMethod::Post,
        upstream_path: "/login",
        response_kind: ResponseKind::Json,
        requires_auth: false,
    },
    OperationSpec {
        id: "issue",
        product: ProductTag::Invoice,
        method: HttpMethod::Post,
        upstream_path: "/einvoice/generate",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "cancel",
        product: ProductTag::Invoice,
        method: HttpMethod::Post,
        upstream_path: "/einvoice/cancel",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "ewb-by-irn",
        product: ProductTag::Invoice,
        method: HttpMethod::Post,
        upstream_path: "/einvoice/ewaybill",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "upload",
        product: ProductTag::Invoice,
        method: HttpMethod::Post,
        upstream_path: "/einvoice/upload",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "print",
        product: ProductTag::Invoice,
        method: HttpMethod::Get,
        upstream_path: "/einvoice/print",
        response_kind: ResponseKind::Binary,
        requires_auth: true,
    },
    OperationSpec {
        id: "login",
        product: ProductTag::Waybill,
        method: HttpMethod::Post,
        upstream_path: "/login",
        response_kind: ResponseKind::Json,
        requires_auth: false,
    },
    OperationSpec {
        id: "generate",
        product: ProductTag::Waybill,
        method: HttpMethod::Post,
        upstream_path: "/ewayapi/generate",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "cancel",
        product: ProductTag::Waybill,
        method: HttpMethod::Post,
        upstream_path: "/ewayapi/cancel",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "update-part-b",
        product: ProductTag::Waybill,
        method: HttpMethod::Post,
        upstream_path: "/ewayapi/vehewb",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "extend",
        product: ProductTag::Waybill,
        method: HttpMethod::Put,
        upstream_path: "/ewayapi/extend",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "consolidate",
        product: ProductTag::Waybill,
        method: HttpMethod::Post,
        upstream_path: "/ewayapi/cewb",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "multi-vehicle",
        product: ProductTag::Waybill,
        method: HttpMethod::Post,
        upstream_path: "/ewayapi/multivehicle",
        response_kind: ResponseKind::Json,
        requires_auth: true,
    },
    OperationSpec {
        id: "print",
        product: ProductTag::Waybill,
        method: HttpMethod::Get,
        upstream_path: "/ewayapi/print",
        response_kind: ResponseKind::Binary,
        requires_auth: true,
    },
];

pub fn lookup(product: ProductTag, id: &str) -> Option<&'static OperationSpec> {
    OPERATIONS
        .iter()
        .find(|op| op.product == product && op.id == id)
}
