//! Payment scheme implementations.
//!
//! A scheme is split by protocol role: the paying client builds payloads,
//! the resource server advertises requirements and the facilitator verifies
//! and settles. Each role has its own trait so a deployment only pulls in
//! the collaborators it needs.

pub mod exact_multiversx;

use crate::errors::Result;
use crate::types::{
    AssetAmount, PaymentPayload, PaymentRequirements, SettlementResponse, VerificationResponse,
};
use async_trait::async_trait;
use serde_json::Value;

/// Client side of a scheme: turns requirements into a signed payload.
#[async_trait]
pub trait SchemeClient: Send + Sync {
    /// Returns the name of this scheme (e.g., "exact").
    fn scheme(&self) -> &str;

    /// Builds a payment payload ready for the X-PAYMENT header.
    ///
    /// # Arguments
    ///
    /// * `requirements` - The payment requirements selected from a 402 response
    async fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload>;
}

/// Resource-server side of a scheme.
pub trait SchemeServer: Send + Sync {
    /// Returns the name of this scheme.
    fn scheme(&self) -> &str;

    /// Parses a price given as a bare amount string or as
    /// `{"amount": .., "asset": ..}`.
    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount>;

    /// Fills in scheme defaults on requirements before they are advertised.
    /// The input is left untouched.
    fn enhance_payment_requirements(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentRequirements>;
}

/// Facilitator side of a scheme.
///
/// Both operations report payment problems inside their response values;
/// `Err` is reserved for failures that prevent producing a verdict at all.
#[async_trait]
pub trait SchemeFacilitator: Send + Sync {
    /// Returns the name of this scheme.
    fn scheme(&self) -> &str;

    /// Checks a payload against requirements without moving funds.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerificationResponse>;

    /// Verifies and then submits the payment on-chain.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettlementResponse>;
}
