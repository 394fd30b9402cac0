//! Facilitator role: verifies a signed transaction and settles it.

use super::relayed_payload;
use crate::address::Address;
use crate::amount::parse_amount;
use crate::errors::{Result, X402Error};
use crate::gateway::{Broadcaster, GatewayClient, Simulator};
use crate::schemes::SchemeFacilitator;
use crate::types::{
    Asset, PaymentPayload, PaymentRequirements, SettlementResponse, TransactionEnvelope,
    VerificationResponse, SCHEME_EXACT,
};
use crate::utils::chain_id_for_network;
use async_trait::async_trait;
use num_bigint::BigUint;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A transaction that passed verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    /// Sender stated by the signed transaction
    pub payer: String,
    /// Hash reported by the simulation
    pub simulation_hash: String,
}

/// Checks a signed transaction against payment requirements.
///
/// The stages run in a fixed order and the first failure is returned:
///
/// 1. the transaction must carry a signature;
/// 2. its `chainID` must be the chain named by the requirements' network;
/// 3. the node must simulate it successfully, which also proves the
///    signature and the sender's balance;
/// 4. for EGLD, `receiver` must equal `payTo` and `value` must cover the
///    amount;
/// 5. for tokens, `data` must be a single-leg `MultiESDTNFTTransfer` of the
///    required token to the account behind `payTo`, for at least the amount.
///
/// Paying more than required is accepted.
#[instrument(skip_all, fields(sender = %tx.sender, nonce = tx.nonce))]
pub async fn verify_payment(
    tx: &TransactionEnvelope,
    requirements: &PaymentRequirements,
    simulator: &dyn Simulator,
) -> Result<VerifiedPayment> {
    if !tx.is_signed() {
        return Err(X402Error::MissingSignature);
    }

    let expected_chain = chain_id_for_network(&requirements.network)?;
    if tx.chain_id != expected_chain {
        return Err(X402Error::ChainMismatch {
            expected: expected_chain,
            actual: tx.chain_id.clone(),
        });
    }

    let simulation = simulator
        .simulate(tx)
        .await
        .map_err(|e| X402Error::SimulationFailed(e.to_string()))?;
    if !simulation.is_success() {
        return Err(X402Error::SimulationFailed(simulation.failure_reason()));
    }
    if simulation.hash.is_empty() {
        return Err(X402Error::SimulationFailed(
            "simulation returned empty hash".to_string(),
        ));
    }
    debug!(hash = %simulation.hash, "simulation succeeded");

    let required = parse_amount(&requirements.amount)?;
    match Asset::classify(&requirements.asset) {
        Asset::Native => check_native_transfer(tx, requirements, &required)?,
        Asset::Token(token) => check_token_transfer(tx, requirements, &token, &required)?,
    }

    Ok(VerifiedPayment {
        payer: tx.sender.clone(),
        simulation_hash: simulation.hash,
    })
}

fn check_native_transfer(
    tx: &TransactionEnvelope,
    requirements: &PaymentRequirements,
    required: &BigUint,
) -> Result<()> {
    if tx.receiver != requirements.pay_to {
        return Err(X402Error::ReceiverMismatch {
            expected: requirements.pay_to.clone(),
            actual: tx.receiver.clone(),
        });
    }

    let value = parse_amount(&tx.value)?;
    if &value < required {
        return Err(X402Error::AmountMismatch {
            expected: required.to_string(),
            actual: value.to_string(),
        });
    }
    debug!(value = %value, "native transfer matches requirements");
    Ok(())
}

fn check_token_transfer(
    tx: &TransactionEnvelope,
    requirements: &PaymentRequirements,
    token: &str,
    required: &BigUint,
) -> Result<()> {
    let instruction = tx.transfer_instruction().map_err(|e| match e {
        X402Error::MalformedTransfer(inner) => X402Error::InvalidTransferFormat(inner.to_string()),
        other => other,
    })?;
    let [transfer] = instruction.transfers.as_slice() else {
        return Err(X402Error::InvalidTransferFormat(format!(
            "expected a single token transfer, got {}",
            instruction.transfers.len()
        )));
    };

    if transfer.token_identifier != token {
        return Err(X402Error::AssetMismatch {
            expected: token.to_string(),
            actual: transfer.token_identifier.clone(),
        });
    }

    let recipient: Address = requirements.pay_to.parse()?;
    if instruction.destination.as_slice() != recipient.as_bytes() {
        return Err(X402Error::ReceiverMismatch {
            expected: recipient.to_hex(),
            actual: hex::encode(&instruction.destination),
        });
    }

    if &transfer.amount < required {
        return Err(X402Error::AmountMismatch {
            expected: required.to_string(),
            actual: transfer.amount.to_string(),
        });
    }
    debug!(token, amount = %transfer.amount, "token transfer matches requirements");
    Ok(())
}

/// Facilitator half of the exact scheme.
#[derive(Clone)]
pub struct ExactMultiversxFacilitator {
    simulator: Arc<dyn Simulator>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl ExactMultiversxFacilitator {
    /// Creates a facilitator that simulates and broadcasts through `gateway`.
    pub fn new(gateway: GatewayClient) -> Self {
        let gateway = Arc::new(gateway);
        Self {
            simulator: gateway.clone(),
            broadcaster: gateway,
        }
    }

    /// Creates a facilitator from separate collaborators.
    pub fn with_collaborators(
        simulator: Arc<dyn Simulator>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            simulator,
            broadcaster,
        }
    }

    async fn verify_payload(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<(TransactionEnvelope, VerifiedPayment)> {
        let tx = relayed_payload(payload)?.data;
        let verified = verify_payment(&tx, requirements, self.simulator.as_ref()).await?;
        Ok((tx, verified))
    }
}

#[async_trait]
impl SchemeFacilitator for ExactMultiversxFacilitator {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerificationResponse> {
        match self.verify_payload(payload, requirements).await {
            Ok((_, verified)) => {
                info!(payer = %verified.payer, "payment verified");
                Ok(VerificationResponse::valid(verified.payer))
            }
            Err(e) => {
                warn!(reason = %e, "payment rejected");
                Ok(VerificationResponse::invalid(e.to_string()))
            }
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettlementResponse> {
        let (tx, verified) = match self.verify_payload(payload, requirements).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(reason = %e, "settlement refused");
                return Ok(SettlementResponse::failed(&requirements.network, e.to_string()));
            }
        };

        match self.broadcaster.broadcast(&tx).await {
            Ok(hash) => {
                info!(payer = %verified.payer, tx_hash = %hash, "payment settled");
                Ok(SettlementResponse {
                    success: true,
                    transaction: hash,
                    network: requirements.network.clone(),
                    payer: Some(verified.payer),
                    error: None,
                })
            }
            Err(e) => {
                warn!(error = %e, "broadcast failed");
                let mut response = SettlementResponse::failed(
                    &requirements.network,
                    X402Error::SettlementError(e.to_string()).to_string(),
                );
                response.payer = Some(verified.payer);
                Ok(response)
            }
        }
    }
}
