//! `MultiESDTNFTTransfer` call data.
//!
//! ESDT tokens do not move through a transaction's `value`. Instead the sender
//! addresses the transaction to itself and puts a built-in function call in
//! the `data` field:
//!
//! ```text
//! MultiESDTNFTTransfer@<dest>@<count>@<token>@<nonce>@<amount>[@<reference>]
//! ```
//!
//! Every argument is lowercase hex. `dest` is the raw 32-byte account key of
//! the real recipient, `token` the UTF-8 token identifier, `nonce` is `00` for
//! fungible tokens and `amount` is even-length big-endian.

use crate::amount::{amount_from_hex, amount_to_hex};
use num_bigint::BigUint;
use thiserror::Error;

/// Name of the built-in multi-token transfer function.
pub const MULTI_ESDT_NFT_TRANSFER: &str = "MultiESDTNFTTransfer";

/// Argument separator in transaction data.
pub const ARGUMENT_SEPARATOR: char = '@';

const MIN_FIELDS: usize = 6;

/// Errors raised while decoding transfer call data.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Wrong function name, wrong field count or unusable field content
    #[error("{0}")]
    Malformed(String),

    /// A field is not valid hex
    #[error("invalid {field} hex: {source}")]
    InvalidHex {
        /// Which argument failed
        field: &'static str,
        /// Underlying decoder error
        #[source]
        source: hex::FromHexError,
    },
}

/// One token leg of a multi-token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Token identifier such as `USDC-c76f1f`
    pub token_identifier: String,
    /// Token nonce; zero for fungible ESDTs
    pub nonce: u64,
    /// Amount in atomic units
    pub amount: BigUint,
}

impl TokenTransfer {
    /// A fungible transfer of `amount` units of `token_identifier`.
    pub fn fungible(token_identifier: impl Into<String>, amount: BigUint) -> Self {
        Self {
            token_identifier: token_identifier.into(),
            nonce: 0,
            amount,
        }
    }
}

/// Parsed view of a `MultiESDTNFTTransfer` data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
    /// Raw account key of the final recipient
    pub destination: Vec<u8>,
    /// Token legs; payloads produced by this crate carry exactly one
    pub transfers: Vec<TokenTransfer>,
    /// Opaque trailing argument, e.g. an invoice id
    pub reference: Option<Vec<u8>>,
}

impl TransferInstruction {
    /// A single fungible transfer to `destination`.
    pub fn single(destination: impl Into<Vec<u8>>, transfer: TokenTransfer) -> Self {
        Self {
            destination: destination.into(),
            transfers: vec![transfer],
            reference: None,
        }
    }

    /// Attaches a trailing reference argument.
    pub fn with_reference(mut self, reference: impl Into<Vec<u8>>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Renders the instruction as transaction data.
    pub fn encode(&self) -> String {
        let mut fields = Vec::with_capacity(3 + self.transfers.len() * 3 + 1);
        fields.push(MULTI_ESDT_NFT_TRANSFER.to_string());
        fields.push(hex::encode(&self.destination));
        fields.push(amount_to_hex(&BigUint::from(self.transfers.len())));
        for transfer in &self.transfers {
            fields.push(hex::encode(transfer.token_identifier.as_bytes()));
            fields.push(amount_to_hex(&BigUint::from(transfer.nonce)));
            fields.push(amount_to_hex(&transfer.amount));
        }
        if let Some(reference) = &self.reference {
            fields.push(hex::encode(reference));
        }
        fields.join("@")
    }

    /// Parses transaction data, rejecting anything that is not a well-formed
    /// `MultiESDTNFTTransfer` call.
    pub fn decode(data: &str) -> Result<Self, TransferError> {
        let fields: Vec<&str> = data.split(ARGUMENT_SEPARATOR).collect();
        if fields.len() < MIN_FIELDS {
            return Err(TransferError::Malformed(format!(
                "expected at least {} fields, got {}",
                MIN_FIELDS,
                fields.len()
            )));
        }
        if fields[0] != MULTI_ESDT_NFT_TRANSFER {
            return Err(TransferError::Malformed(format!(
                "unexpected function {:?}",
                fields[0]
            )));
        }

        let destination = decode_field("destination", fields[1])?;
        let count = decode_number("count", fields[2])?;
        if count == 0 {
            return Err(TransferError::Malformed("transfer count is zero".to_string()));
        }

        let legs_end = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(3))
            .and_then(|len| len.checked_add(3))
            .filter(|&end| end <= fields.len())
            .ok_or_else(|| {
                TransferError::Malformed(format!(
                    "transfer count {} needs more fields than the {} present",
                    count,
                    fields.len()
                ))
            })?;

        let transfers = fields[3..legs_end]
            .chunks_exact(3)
            .map(|leg| -> Result<TokenTransfer, TransferError> {
                let token = decode_field("token", leg[0])?;
                let token_identifier = String::from_utf8(token).map_err(|_| {
                    TransferError::Malformed("token identifier is not UTF-8".to_string())
                })?;
                Ok(TokenTransfer {
                    token_identifier,
                    nonce: decode_number("nonce", leg[1])?,
                    amount: decode_amount(leg[2])?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reference = match &fields[legs_end..] {
            [] => None,
            [reference] => Some(decode_field("reference", reference)?),
            trailing => {
                return Err(TransferError::Malformed(format!(
                    "{} unexpected trailing fields",
                    trailing.len()
                )))
            }
        };

        Ok(Self {
            destination,
            transfers,
            reference,
        })
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, TransferError> {
    hex::decode(value).map_err(|source| TransferError::InvalidHex { field, source })
}

fn decode_number(field: &'static str, value: &str) -> Result<u64, TransferError> {
    let bytes = decode_field(field, value)?;
    let significant = bytes
        .iter()
        .position(|&b| b != 0)
        .map_or(&[][..], |start| &bytes[start..]);
    if significant.len() > 8 {
        return Err(TransferError::Malformed(format!("{} does not fit in 64 bits", field)));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

fn decode_amount(value: &str) -> Result<BigUint, TransferError> {
    // Surface the hex failure with its field name instead of an amount error.
    decode_field("amount", value)?;
    amount_from_hex(value).map_err(|e| TransferError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    const BOB: &str = "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx";
    const BOB_HEX: &str = "8049d639e5a6980d1cd2392abcce41029cda74a1563523a202f09641cc2618f8";

    fn bob() -> Address {
        BOB.parse().unwrap()
    }

    #[test]
    fn test_encode_single_transfer() {
        let instruction = TransferInstruction::single(
            bob().as_bytes().to_vec(),
            TokenTransfer::fungible("TEST-123456", BigUint::from(100u32)),
        );
        assert_eq!(
            instruction.encode(),
            format!("MultiESDTNFTTransfer@{BOB_HEX}@01@544553542d313233343536@00@64")
        );
    }

    #[test]
    fn test_encode_with_reference() {
        let instruction = TransferInstruction::single(
            bob().as_bytes().to_vec(),
            TokenTransfer::fungible("TEST-123456", BigUint::from(100u32)),
        )
        .with_reference("inv_123");
        assert!(instruction.encode().ends_with("@64@696e765f313233"));
    }

    #[test]
    fn test_decode_reverses_encode() {
        let instruction = TransferInstruction::single(
            bob().as_bytes().to_vec(),
            TokenTransfer::fungible("USDC-c76f1f", BigUint::from(1_500_000u32)),
        )
        .with_reference("inv_123");
        let decoded = TransferInstruction::decode(&instruction.encode()).unwrap();
        assert_eq!(decoded, instruction);
        assert_eq!(decoded.reference.as_deref(), Some(&b"inv_123"[..]));
    }

    #[test]
    fn test_decode_multiple_legs() {
        let data = format!(
            "MultiESDTNFTTransfer@{BOB_HEX}@02@{}@00@0a@{}@05@01",
            hex::encode("AAA-111111"),
            hex::encode("NFT-222222")
        );
        let decoded = TransferInstruction::decode(&data).unwrap();
        assert_eq!(decoded.transfers.len(), 2);
        assert_eq!(decoded.transfers[0].amount, BigUint::from(10u32));
        assert_eq!(decoded.transfers[1].token_identifier, "NFT-222222");
        assert_eq!(decoded.transfers[1].nonce, 5);
        assert!(decoded.reference.is_none());
    }

    #[test]
    fn test_decode_rejects_short_or_foreign_data() {
        assert!(matches!(
            TransferInstruction::decode(""),
            Err(TransferError::Malformed(_))
        ));
        assert!(matches!(
            TransferInstruction::decode("MultiESDTNFTTransfer@00@01@00@00"),
            Err(TransferError::Malformed(_))
        ));
        assert!(matches!(
            TransferInstruction::decode(&format!("ESDTTransfer@{BOB_HEX}@01@00@00@64")),
            Err(TransferError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_hex() {
        let err = TransferInstruction::decode("MultiESDTNFTTransfer@zz@01@41@00@64").unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidHex {
                field: "destination",
                ..
            }
        ));

        let err =
            TransferInstruction::decode(&format!("MultiESDTNFTTransfer@{BOB_HEX}@01@41@00@6"))
                .unwrap_err();
        assert!(matches!(err, TransferError::InvalidHex { field: "amount", .. }));
    }

    #[test]
    fn test_decode_rejects_count_mismatch() {
        let data = format!("MultiESDTNFTTransfer@{BOB_HEX}@02@41@00@64");
        assert!(matches!(
            TransferInstruction::decode(&data),
            Err(TransferError::Malformed(_))
        ));

        let data = format!("MultiESDTNFTTransfer@{BOB_HEX}@00@41@00@64");
        assert!(matches!(
            TransferInstruction::decode(&data),
            Err(TransferError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_extra_trailing_fields() {
        let data = format!("MultiESDTNFTTransfer@{BOB_HEX}@01@41@00@64@706179@01");
        assert!(matches!(
            TransferInstruction::decode(&data),
            Err(TransferError::Malformed(_))
        ));
    }
}
