use shared::{
    domain::ProductId,
    protocol::{AttributeSpec, ProductDesign, ValidationReport},
};

/// Which dialog an asynchronous result was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogKind {
    Create,
    Attributes,
    Design,
    Validate,
}

/// Slot-local state of the create form. Lives inside the dialog variant so a
/// failed submit keeps the user's input, and closing discards it wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateForm {
    pub error: Option<String>,
    pub submitting: bool,
}

/// The single active dialog. A tagged variant instead of per-dialog booleans:
/// two dialogs can never be open at once, and a payload cannot outlive the
/// binding it was fetched for because it lives inside the variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ActiveDialog {
    #[default]
    None,
    Create {
        form: CreateForm,
    },
    Attributes {
        product_id: ProductId,
        payload: Option<Vec<AttributeSpec>>,
    },
    Design {
        product_id: ProductId,
        payload: Option<ProductDesign>,
    },
    Validate {
        product_id: ProductId,
        payload: Option<ValidationReport>,
    },
}

impl ActiveDialog {
    pub fn kind(&self) -> Option<DialogKind> {
        match self {
            ActiveDialog::None => None,
            ActiveDialog::Create { .. } => Some(DialogKind::Create),
            ActiveDialog::Attributes { .. } => Some(DialogKind::Attributes),
            ActiveDialog::Design { .. } => Some(DialogKind::Design),
            ActiveDialog::Validate { .. } => Some(DialogKind::Validate),
        }
    }

    pub fn bound_product(&self) -> Option<ProductId> {
        match self {
            ActiveDialog::None | ActiveDialog::Create { .. } => None,
            ActiveDialog::Attributes { product_id, .. }
            | ActiveDialog::Design { product_id, .. }
            | ActiveDialog::Validate { product_id, .. } => Some(*product_id),
        }
    }

    pub fn is_open(&self, kind: DialogKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Stale-response guard helper: true only when `kind` is open and bound
    /// to `id`, i.e. a payload fetched for `(kind, id)` may still be shown.
    pub fn is_bound(&self, kind: DialogKind, id: ProductId) -> bool {
        self.kind() == Some(kind) && self.bound_product() == Some(id)
    }
}
