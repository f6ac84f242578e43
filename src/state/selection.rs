//! Active product/code selection.
//!
//! Multi-code products are not addressable until the user picks a code;
//! the single-code family resolves immediately under the sentinel code.

use crate::data::{ProductCode, ProductKind};

/// The product + code pair the engine is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    product: ProductKind,
    code: Option<ProductCode>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(ProductKind::default())
    }
}

impl Selection {
    pub fn new(product: ProductKind) -> Self {
        Self {
            product,
            code: product.is_single_code().then(ProductCode::sentinel),
        }
    }

    pub fn product(&self) -> ProductKind {
        self.product
    }

    /// Switch products. Multi-code products start unresolved; the code
    /// must be selected again before frames are addressable.
    pub fn select_product(&mut self, product: ProductKind) {
        self.product = product;
        self.code = product.is_single_code().then(ProductCode::sentinel);
    }

    /// Select a code for the active multi-code product.
    ///
    /// Ignored for the single-code family, whose code is fixed.
    pub fn select_code(&mut self, code: ProductCode) {
        if self.product.is_single_code() {
            log::warn!(
                "Ignoring code selection {} for single-code product {}",
                code,
                self.product
            );
            return;
        }
        self.code = Some(code);
    }

    /// The resolved code, if any.
    pub fn code(&self) -> Option<&ProductCode> {
        self.code.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.code.is_some()
    }

    /// The addressable (product, code) pair, once resolved.
    pub fn pair(&self) -> Option<(ProductKind, ProductCode)> {
        self.code.clone().map(|code| (self.product, code))
    }

    /// Whether index-mutating operations are permitted at the given tilt.
    ///
    /// Multi-code products animate only from tilt rest position 0; the
    /// single-code family is unrestricted.
    pub fn permits_stepping(&self, tilt: usize) -> bool {
        match &self.code {
            Some(_) if self.product.is_single_code() => true,
            Some(_) => tilt == 0,
            None => false,
        }
    }
}
