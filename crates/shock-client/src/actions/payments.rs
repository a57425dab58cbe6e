use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use shock_shared::constants::PAYMENT_TIMEOUT_SECS;

use super::{logged, Actions};
use crate::error::{ClientError, RemoteOperationError, Result};

/// Routing fee settings as the wallet stores them: decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePolicy {
    /// Flat fee in satoshis.
    pub absolute_fee: String,
    /// Fraction of the amount, e.g. `"0.01"` for one percent.
    pub relative_fee: String,
}

impl FeePolicy {
    pub fn new(absolute_fee: impl Into<String>, relative_fee: impl Into<String>) -> Self {
        Self {
            absolute_fee: absolute_fee.into(),
            relative_fee: relative_fee.into(),
        }
    }
}

// Stricter than a plain zero check: negative fees are refused as well.
fn parse_fee(name: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ClientError::InvalidFee(format!("{name} is not a number: {raw:?}")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ClientError::InvalidFee(format!(
            "{name} must be a positive number: {raw:?}"
        )));
    }
    Ok(value)
}

/// Maximum routing fee for a payment of `amount` satoshis: the relative
/// share plus the flat fee, rounded down and never above the amount.
pub fn fee_limit(amount: u64, fees: &FeePolicy) -> Result<u64> {
    let absolute = parse_fee("absoluteFee", &fees.absolute_fee)?;
    let relative = parse_fee("relativeFee", &fees.relative_fee)?;

    let limit = (amount as f64 * relative + absolute).floor();
    // `as` saturates on overflow.
    Ok((limit as u64).min(amount))
}

impl Actions {
    /// Pay `amount` satoshis to `recipient_pub`. Returns the payment
    /// preimage.
    pub async fn send_payment(
        &self,
        recipient_pub: &str,
        amount: u64,
        memo: &str,
        fees: &FeePolicy,
    ) -> Result<String> {
        let result = async {
            let fee_limit = fee_limit(amount, fees)?;
            let session_uuid = chrono::Utc::now().timestamp_millis().to_string();

            let body = json!({
                "recipientPub": recipient_pub,
                "amount": amount,
                "memo": memo,
                "feeLimit": fee_limit,
                "sessionUuid": session_uuid,
            });
            let response = self
                .api
                .send(
                    Method::POST,
                    "/api/gun/sendpayment",
                    Some(&body),
                    Some(Duration::from_secs(PAYMENT_TIMEOUT_SECS)),
                )
                .await?
                .ensure_success()?;

            let preimage = response
                .body
                .get("preimage")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    RemoteOperationError::InvalidResponse("missing preimage".to_string())
                })?
                .to_string();

            info!(amount, fee_limit, %session_uuid, "payment sent");
            Ok::<_, ClientError>(preimage)
        }
        .await;

        logged("send_payment", result)
    }
}
