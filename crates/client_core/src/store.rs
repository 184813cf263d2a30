use chrono::{DateTime, Utc};
use shared::{
    domain::{ProductId, ProductStatus, RefreshFrequency},
    protocol::{AttributeSpec, DataProduct, ProductDesign},
};

/// Authoritative local view of the product collection. All transitions are
/// pure and synchronous; only the workflow controller may call them.
#[derive(Debug, Default)]
pub struct ProductStore {
    entities: Vec<DataProduct>,
    loading: bool,
    error: Option<String>,
}

/// Local partial update applied by `ProductStore::patch`. Unset fields leave
/// the entity untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProductStatus>,
    pub refresh_frequency: Option<RefreshFrequency>,
    pub attributes: Option<Vec<AttributeSpec>>,
    pub design: Option<ProductDesign>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProductPatch {
    /// Patch built from the entity the service returned after a write, so the
    /// local record picks up the server-assigned fields.
    pub fn from_confirmed(product: &DataProduct) -> Self {
        Self {
            name: Some(product.name.clone()),
            description: Some(product.description.clone()),
            status: Some(product.status),
            refresh_frequency: Some(product.refresh_frequency),
            attributes: product.attributes.clone(),
            design: product.design.clone(),
            last_updated: Some(product.last_updated),
        }
    }
}

impl ProductStore {
    pub fn entities(&self) -> &[DataProduct] {
        &self.entities
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get(&self, id: ProductId) -> Option<&DataProduct> {
        self.entities.iter().find(|product| product.id == id)
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Replaces the list wholesale. Duplicate ids in the payload collapse to
    /// the last occurrence so the one-entry-per-id invariant holds even
    /// against a misbehaving service.
    pub fn set_entities(&mut self, entities: Vec<DataProduct>) {
        self.entities.clear();
        for product in entities {
            self.upsert(product);
        }
        self.loading = false;
    }

    /// A failed refresh never blanks a previously good view.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn append(&mut self, product: DataProduct) {
        self.upsert(product);
    }

    pub fn remove(&mut self, id: ProductId) {
        self.entities.retain(|product| product.id != id);
    }

    /// No-op on a missing id, tolerating races with a concurrent delete.
    pub fn patch(&mut self, id: ProductId, patch: ProductPatch) {
        let Some(product) = self.entities.iter_mut().find(|product| product.id == id) else {
            return;
        };
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(status) = patch.status {
            product.status = status;
        }
        if let Some(refresh_frequency) = patch.refresh_frequency {
            product.refresh_frequency = refresh_frequency;
        }
        if let Some(attributes) = patch.attributes {
            product.attributes = Some(attributes);
        }
        if let Some(design) = patch.design {
            product.design = Some(design);
        }
        if let Some(last_updated) = patch.last_updated {
            product.last_updated = last_updated;
        }
    }

    fn upsert(&mut self, product: DataProduct) {
        match self.entities.iter_mut().find(|entry| entry.id == product.id) {
            Some(existing) => *existing = product,
            None => self.entities.push(product),
        }
    }
}
