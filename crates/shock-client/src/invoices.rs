//! Decoded invoices keyed by their payment request.

use std::collections::HashMap;

use parking_lot::RwLock;

use shock_shared::types::{DecodedInvoice, KeyedDecodedInvoice};

#[derive(Debug, Default)]
pub struct DecodedInvoices {
    entries: RwLock<HashMap<String, DecodedInvoice>>,
}

impl DecodedInvoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a decoded invoice. An existing entry for the same payment
    /// request is replaced as a whole.
    pub fn insert(&self, keyed: KeyedDecodedInvoice) {
        self.entries
            .write()
            .insert(keyed.payment_request, keyed.invoice);
    }

    pub fn get(&self, payment_request: &str) -> Option<DecodedInvoice> {
        self.entries.read().get(payment_request).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
