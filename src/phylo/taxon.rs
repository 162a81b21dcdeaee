use crate::splits::Bitmask;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use std::fmt::Display;
use std::sync::Arc;

new_key_type! { pub struct TaxonId; }

/// An operational taxonomic unit.
///
/// Taxa are compared by [TaxonId], never by label: two taxa may carry the
/// same label and still be distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxon {
    label: Arc<str>,
    index: usize,
}

impl Taxon {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Position of the taxon in its namespace; its bit in every split mask.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ordered collection of taxa shared by many trees.
///
/// Insertion order assigns each taxon its bit index. Taxa are never removed or
/// reordered, so a bit index stays valid for as long as the namespace lives
/// and split masks computed against it remain comparable across trees.
///
/// A locked (immutable) namespace refuses to create taxa for labels it has
/// not seen, which turns unknown leaf labels into parse errors.
#[derive(Debug, Clone, Default)]
pub struct TaxonNamespace {
    taxa: SlotMap<TaxonId, Taxon>,
    order: Vec<TaxonId>,
    by_label: FxHashMap<Arc<str>, Vec<TaxonId>>,
    locked: bool,
}

impl TaxonNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ns = Self::new();
        for label in labels {
            _ = ns.add_taxon(label);
        }
        ns
    }

    /// Appends a new taxon, even if another taxon already has this label.
    pub fn add_taxon(&mut self, label: &str) -> TaxonId {
        let label: Arc<str> = label.into();
        let index = self.order.len();
        let taxon_id =
            self.taxa.insert(Taxon { label: label.clone(), index });
        self.order.push(taxon_id);
        self.by_label.entry(label).or_default().push(taxon_id);
        log::trace!("New taxon {index}: {taxon_id}");
        taxon_id
    }

    /// First taxon with `label`, created on demand while the namespace is
    /// mutable.
    pub fn require_taxon(&mut self, label: &str) -> Option<TaxonId> {
        if let Some(taxon_id) = self.find(label) {
            Some(taxon_id)
        } else if self.locked {
            None
        } else {
            Some(self.add_taxon(label))
        }
    }

    pub fn find(&self, label: &str) -> Option<TaxonId> {
        self.by_label.get(label).and_then(|ids| ids.first()).copied()
    }

    /// All taxa sharing `label`, in insertion order.
    pub fn find_all(&self, label: &str) -> &[TaxonId] {
        self.by_label.get(label).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, taxon_id: TaxonId) -> bool {
        self.taxa.contains_key(taxon_id)
    }

    pub fn taxon(&self, taxon_id: TaxonId) -> Option<&Taxon> {
        self.taxa.get(taxon_id)
    }

    pub fn label(&self, taxon_id: TaxonId) -> Option<&str> {
        self.taxon(taxon_id).map(Taxon::label)
    }

    pub fn bit_index(&self, taxon_id: TaxonId) -> Option<usize> {
        self.taxon(taxon_id).map(Taxon::index)
    }

    pub fn taxon_at(&self, index: usize) -> Option<TaxonId> {
        self.order.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Taxa in bit-index order.
    pub fn iter(&self) -> impl Iterator<Item = (TaxonId, &Taxon)> {
        self.order.iter().map(|&taxon_id| (taxon_id, &self.taxa[taxon_id]))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.iter().map(|(_, taxon)| taxon.label()).collect()
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_mutable(&self) -> bool {
        !self.locked
    }

    /// Mask with one bit for every taxon in the namespace.
    pub fn all_taxa_mask(&self) -> Bitmask {
        Bitmask::with_low_bits(self.len())
    }

    /// Mask of the given taxa; ids foreign to this namespace are ignored.
    pub fn bitmask_for(&self, taxon_ids: &[TaxonId]) -> Bitmask {
        taxon_ids.iter().filter_map(|&id| self.bit_index(id)).collect()
    }

    /// Taxa whose bits are set in `mask`, in bit-index order.
    pub fn taxa_in(&self, mask: &Bitmask) -> Vec<TaxonId> {
        mask.iter().filter_map(|index| self.taxon_at(index)).collect()
    }

    /// Labels of the taxa in `mask`, in bit-index order.
    pub fn labels_in(&self, mask: &Bitmask) -> Vec<&str> {
        self.taxa_in(mask)
            .into_iter()
            .filter_map(|taxon_id| self.label(taxon_id))
            .collect()
    }
}

impl Display for TaxonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let disp = format!("{self:?}");
        write!(f, "{}", &disp[8..disp.len() - 1])
    }
}
