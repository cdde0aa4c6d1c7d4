use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::models::job::{GenerationRequest, Quality};

/// Cost of a standard-quality render.
const BASE_COST: u32 = 20;

/// Surcharge for high-quality renders.
const HQ_EXTRA_COST: u32 = 10;

/// Credits charged for a render. Depends only on the requested quality.
pub fn estimate_credits(request: &GenerationRequest) -> u32 {
    match request.quality {
        Quality::Standard => BASE_COST,
        Quality::High => BASE_COST + HQ_EXTRA_COST,
    }
}

pub fn format_credits(credits: i64) -> String {
    format!("{credits} pts")
}

/// A purchasable bundle of credits.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreditPack {
    pub id: &'static str,
    pub name: &'static str,
    pub credits: u32,
    pub price_label: &'static str,
}

pub const CREDIT_PACKS: [CreditPack; 3] = [
    CreditPack {
        id: "pack-100",
        name: "Starter 100",
        credits: 100,
        price_label: "NT$149",
    },
    CreditPack {
        id: "pack-300",
        name: "Creator 300",
        credits: 300,
        price_label: "NT$399",
    },
    CreditPack {
        id: "pack-1000",
        name: "Studio 1000",
        credits: 1000,
        price_label: "NT$1,099",
    },
];

pub fn find_pack(pack_id: &str) -> Option<&'static CreditPack> {
    CREDIT_PACKS.iter().find(|pack| pack.id == pack_id)
}

/// Running credit balance for one session.
///
/// Check-then-debit happens under a single lock so concurrent generations
/// cannot overspend.
pub struct CreditLedger {
    balance: Mutex<i64>,
}

impl CreditLedger {
    pub fn new(initial: i64) -> Self {
        Self {
            balance: Mutex::new(initial),
        }
    }

    pub async fn balance(&self) -> i64 {
        *self.balance.lock().await
    }

    /// Debit `amount` if the balance covers it. Returns the new balance.
    pub async fn try_debit(&self, amount: u32) -> Result<i64, CreditError> {
        let mut balance = self.balance.lock().await;
        let amount = i64::from(amount);
        if *balance < amount {
            return Err(CreditError::Insufficient {
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    /// Credit `amount` back. Returns the new balance.
    pub async fn credit(&self, amount: u32) -> i64 {
        let mut balance = self.balance.lock().await;
        *balance += i64::from(amount);
        *balance
    }

    /// Add the credits of a pack. Payment is handled elsewhere.
    pub async fn purchase(&self, pack_id: &str) -> Result<i64, CreditError> {
        let pack = find_pack(pack_id).ok_or_else(|| CreditError::UnknownPack(pack_id.to_string()))?;
        let balance = self.credit(pack.credits).await;
        info!(pack_id = pack.id, credits = pack.credits, balance, "Credit pack purchased");
        Ok(balance)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("Not enough credits for this generation (required {required}, available {available})")]
    Insufficient { required: i64, available: i64 },

    #[error("Unknown credit pack: {0}")]
    UnknownPack(String),
}
