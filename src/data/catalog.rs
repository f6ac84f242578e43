//! Product catalog built from the remote listing.
//!
//! The catalog maps each product family to its time-ordered volume
//! prefixes and per-volume sweep counts, and carries the code descriptors
//! for multi-code families. It is rebuilt wholesale from a fresh listing on
//! every refresh; partial mutation would let callers observe an
//! inconsistent cross-index state mid-update.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::keys::{PrefixKey, ProductCode, ProductKind, TimePrefix};

/// One file entry in the raw remote listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawFileEntry {
    /// Number of elevation sweeps rendered for this volume.
    pub sweeps: u32,
}

/// Full remote listing: product -> file name -> entry.
///
/// File names may carry a `.png` suffix (the listing mirrors the image
/// store); it is stripped during catalog construction. `BTreeMap` keeps
/// names sorted, which is chronological order for the prefix convention.
pub type RawCatalog = HashMap<ProductKind, BTreeMap<String, RawFileEntry>>;

/// Descriptor for one selectable code within a multi-code family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOption {
    pub value: String,
    pub label: String,
    /// Number of volumes listed under this code at listing time.
    pub count: u32,
}

/// Code descriptors per product, as served by the code listing endpoint.
pub type CodeCatalog = HashMap<ProductKind, Vec<CodeOption>>;

/// Immutable view over one complete listing generation.
#[derive(Default)]
pub struct ProductCatalog {
    /// Per product: volume prefix -> sweep count.
    sweeps: HashMap<ProductKind, HashMap<TimePrefix, u32>>,
    /// Per (product, code): ascending time sequence of prefixes.
    sequences: HashMap<(ProductKind, ProductCode), Vec<TimePrefix>>,
    codes: CodeCatalog,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a raw listing and the code descriptors.
    ///
    /// Single-code products get one sequence under the sentinel code;
    /// multi-code products get one sequence per listed code, filtered by
    /// the prefix's trailing `_CODE` segment.
    pub fn build(raw: RawCatalog, codes: CodeCatalog) -> Self {
        let mut sweeps: HashMap<ProductKind, HashMap<TimePrefix, u32>> = HashMap::new();
        let mut sequences: HashMap<(ProductKind, ProductCode), Vec<TimePrefix>> = HashMap::new();

        for (product, files) in raw {
            let mut prefixes = Vec::with_capacity(files.len());
            let product_sweeps = sweeps.entry(product).or_default();

            for (name, entry) in files {
                if entry.sweeps == 0 {
                    log::warn!("Listing entry {} has no sweeps, skipping", name);
                    continue;
                }
                let prefix = TimePrefix::new(name.trim_end_matches(".png"));
                product_sweeps.insert(prefix.clone(), entry.sweeps);
                prefixes.push(prefix);
            }

            if product.is_single_code() {
                sequences.insert((product, ProductCode::sentinel()), prefixes);
            } else {
                for option in codes.get(&product).map(Vec::as_slice).unwrap_or(&[]) {
                    let code = ProductCode::new(option.value.clone());
                    let filtered: Vec<TimePrefix> = prefixes
                        .iter()
                        .filter(|p| p.matches_code(&code))
                        .cloned()
                        .collect();
                    sequences.insert((product, code), filtered);
                }
            }
        }

        log::debug!(
            "Catalog built: {} product(s), {} sequence(s)",
            sweeps.len(),
            sequences.len()
        );

        Self {
            sweeps,
            sequences,
            codes,
        }
    }

    /// Whether the catalog has any listed volumes at all.
    pub fn is_empty(&self) -> bool {
        self.sweeps.values().all(HashMap::is_empty)
    }

    /// Ascending time sequence of prefixes for a product + code.
    pub fn prefix_sequence(&self, product: ProductKind, code: &ProductCode) -> &[TimePrefix] {
        self.sequences
            .get(&(product, code.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_frames(&self, product: ProductKind, code: &ProductCode) -> bool {
        !self.prefix_sequence(product, code).is_empty()
    }

    pub fn prefix_at(
        &self,
        product: ProductKind,
        code: &ProductCode,
        time: usize,
    ) -> Option<&TimePrefix> {
        self.prefix_sequence(product, code).get(time)
    }

    pub fn sweep_count(&self, product: ProductKind, prefix: &TimePrefix) -> Option<u32> {
        self.sweeps.get(&product)?.get(prefix).copied()
    }

    /// Highest valid time index for a product + code.
    pub fn max_time(&self, product: ProductKind, code: &ProductCode) -> Option<usize> {
        let len = self.prefix_sequence(product, code).len();
        len.checked_sub(1)
    }

    /// Highest valid tilt index within one volume.
    pub fn max_tilt(&self, product: ProductKind, prefix: &TimePrefix) -> Option<usize> {
        let sweeps = self.sweep_count(product, prefix)?;
        (sweeps as usize).checked_sub(1)
    }

    /// Code descriptors for a product (empty for single-code families).
    pub fn code_options(&self, product: ProductKind) -> &[CodeOption] {
        self.codes.get(&product).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every prefix-level identity reachable from this listing generation.
    ///
    /// The cache evicts entries whose identity is absent from this set.
    pub fn valid_prefix_keys(&self) -> HashSet<PrefixKey> {
        let mut keys = HashSet::new();
        for ((product, code), prefixes) in &self.sequences {
            for prefix in prefixes {
                keys.insert(PrefixKey {
                    product: *product,
                    code: code.clone(),
                    prefix: prefix.clone(),
                });
            }
        }
        keys
    }

    /// Total number of renderable frames (all tilts of all volumes) for a
    /// product + code. This is the prefetch batch size.
    pub fn frame_count(&self, product: ProductKind, code: &ProductCode) -> usize {
        self.prefix_sequence(product, code)
            .iter()
            .map(|p| self.sweep_count(product, p).unwrap_or(0) as usize)
            .sum()
    }

    /// Whether the calendar day changes between time index `i` and `i + 1`.
    ///
    /// Timeline hosts render a day divider between such ticks.
    pub fn day_rollover_after(&self, product: ProductKind, code: &ProductCode, i: usize) -> bool {
        let seq = self.prefix_sequence(product, code);
        match (seq.get(i), seq.get(i + 1)) {
            (Some(a), Some(b)) => match (a.date_part(), b.date_part()) {
                (Some(da), Some(db)) => da != db,
                _ => false,
            },
            _ => false,
        }
    }
}
