//! In-memory doubles for the pieces that talk to the outside world.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use ap_common::Credits;

use crate::{
    catalog::{CatalogItem, ItemKind, ServiceKind, StaticCatalog},
    traits::{CaptureOutcome, IntentRequest, IntentResult, PaymentProvider, ProviderError},
};

/// A small catalog covering every item kind, for tests.
pub fn sample_catalog() -> StaticCatalog {
    let items = vec![
        CatalogItem {
            id: "credits-500".to_string(),
            name: "500 credits".to_string(),
            price: Credits::from(499),
            kind: ItemKind::Credits { amount: Credits::from(500) },
        },
        CatalogItem {
            id: "premium-30".to_string(),
            name: "Premium membership, 30 days".to_string(),
            price: Credits::from(999),
            kind: ItemKind::Membership { tier: "premium".to_string(), days: 30 },
        },
        CatalogItem {
            id: "svc-rename".to_string(),
            name: "Nickname change".to_string(),
            price: Credits::from(300),
            kind: ItemKind::Service { service: ServiceKind::RenameNickname },
        },
        CatalogItem {
            id: "svc-reclaim".to_string(),
            name: "Nickname reclaim review".to_string(),
            price: Credits::from(500),
            kind: ItemKind::Service { service: ServiceKind::ReclaimNickname },
        },
        CatalogItem {
            id: "svc-reset".to_string(),
            name: "Stats reset".to_string(),
            price: Credits::from(200),
            kind: ItemKind::Service { service: ServiceKind::ResetStats },
        },
    ];
    StaticCatalog::from_items(items).expect("sample catalog is valid")
}

/// An in-memory payment provider with scriptable failure behaviour.
///
/// Captures are idempotent, like the real provider: a second capture for the same intent returns
/// the stored capture.
#[derive(Clone, Default)]
pub struct MockPayVault {
    state: Arc<Mutex<MockVaultState>>,
}

#[derive(Default)]
struct MockVaultState {
    transient_failures: u32,
    decline_captures: bool,
    capture_amount_override: Option<Credits>,
    next_id: u64,
    intents: HashMap<String, IntentRequest>,
    captures: HashMap<String, CaptureOutcome>,
    capture_calls: u32,
}

impl MockPayVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` provider calls fail with a transient error before succeeding again.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().unwrap().transient_failures = n;
    }

    /// Every capture from now on is declined.
    pub fn decline_captures(&self, decline: bool) {
        self.state.lock().unwrap().decline_captures = decline;
    }

    /// Captures report `amount` instead of the amount the intent was registered with, simulating
    /// a provider that settles the wrong figure.
    pub fn override_capture_amount(&self, amount: Credits) {
        self.state.lock().unwrap().capture_amount_override = Some(amount);
    }

    /// How many capture calls reached the provider (including replays).
    pub fn capture_calls(&self) -> u32 {
        self.state.lock().unwrap().capture_calls
    }

    /// How many distinct captures actually happened.
    pub fn captures_made(&self) -> usize {
        self.state.lock().unwrap().captures.len()
    }
}

impl PaymentProvider for MockPayVault {
    async fn register_intent(&self, request: IntentRequest) -> Result<IntentResult, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(ProviderError::Transient("simulated outage".to_string()));
        }
        state.next_id += 1;
        let intent_id = format!("pv_int_{:04}", state.next_id);
        state.intents.insert(intent_id.clone(), request);
        let approval_url = format!("https://payvault.test/approve/{intent_id}");
        Ok(IntentResult { intent_id, approval_url })
    }

    async fn capture(&self, intent_id: &str) -> Result<CaptureOutcome, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.capture_calls += 1;
        if let Some(existing) = state.captures.get(intent_id) {
            return Ok(existing.clone());
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(ProviderError::Transient("simulated outage".to_string()));
        }
        if state.decline_captures {
            return Err(ProviderError::Declined("card refused".to_string()));
        }
        let intent = state
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api(format!("Unknown intent {intent_id}")))?;
        state.next_id += 1;
        let amount = state.capture_amount_override.unwrap_or(intent.amount);
        let capture = CaptureOutcome {
            capture_id: format!("pv_cap_{:04}", state.next_id),
            amount,
            currency: intent.currency,
        };
        state.captures.insert(intent_id.to_string(), capture.clone());
        Ok(capture)
    }

    async fn capture_status(&self, intent_id: &str) -> Result<Option<CaptureOutcome>, ProviderError> {
        let state = self.state.lock().unwrap();
        Ok(state.captures.get(intent_id).cloned())
    }
}
