use crate::tx::Amount;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Unique identifier for a transaction (32 bytes, shown as hex)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId([u8; 32]);

impl TxId {
    /// The all-zero id, used only by null (coinbase) outpoints
    pub const ZERO: TxId = TxId([0u8; 32]);

    /// Create a TxId from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a TxId by hashing an arbitrary label
    pub fn from_label(label: &str) -> Self {
        let hash = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from a 64 character hex string
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Reference to a specific output of a prior transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    txid: TxId,
    vout: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The null outpoint carried by coinbase inputs
    pub fn null() -> Self {
        Self {
            txid: TxId::ZERO,
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == TxId::ZERO && self.vout == u32::MAX
    }

    pub fn txid(&self) -> &TxId {
        &self.txid
    }

    pub fn vout(&self) -> u32 {
        self.vout
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Owner address of an output
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single output: value paid to an owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    address: Address,
    amount: Amount,
}

impl TxOutput {
    pub fn new(address: Address, amount: Amount) -> Self {
        Self { address, amount }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// A fully formed transaction as supplied by the signer
///
/// The fee is carried as a balance delta (`<= 0`) and is never derived
/// from input and output values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TxId,
    inputs: Vec<OutPoint>,
    outputs: Vec<TxOutput>,
    fee: Amount,
    nonce: u64,
}

impl Transaction {
    /// Create a transaction with an externally supplied id
    pub fn new(id: TxId, inputs: Vec<OutPoint>, outputs: Vec<TxOutput>, fee: Amount) -> Self {
        Self::with_nonce(id, inputs, outputs, fee, 0)
    }

    pub(crate) fn with_nonce(
        id: TxId,
        inputs: Vec<OutPoint>,
        outputs: Vec<TxOutput>,
        fee: Amount,
        nonce: u64,
    ) -> Self {
        Self {
            id,
            inputs,
            outputs,
            fee,
            nonce,
        }
    }

    pub fn id(&self) -> &TxId {
        &self.id
    }

    pub fn inputs(&self) -> &[OutPoint] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// A coinbase has exactly one input and it is the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_null()
    }

    /// Inputs that reference real prior outputs
    pub fn spent_outpoints(&self) -> impl Iterator<Item = &OutPoint> {
        self.inputs.iter().filter(|op| !op.is_null())
    }

    pub fn spends(&self, outpoint: &OutPoint) -> bool {
        self.inputs.contains(outpoint)
    }

    pub fn output(&self, vout: u32) -> Option<&TxOutput> {
        self.outputs.get(vout as usize)
    }

    /// Sum of all output values
    pub fn total_output(&self) -> Amount {
        self.outputs.iter().map(|o| o.amount()).sum()
    }

    /// Recompute the content hash of this transaction
    pub fn compute_id(&self) -> TxId {
        content_id(&self.inputs, &self.outputs, self.fee, self.nonce)
    }
}

/// Hash the deterministic encoding of a transaction body
pub(crate) fn content_id(
    inputs: &[OutPoint],
    outputs: &[TxOutput],
    fee: Amount,
    nonce: u64,
) -> TxId {
    let mut bytes = Vec::new();

    bytes.extend_from_slice(&(inputs.len() as u32).to_le_bytes());
    for input in inputs {
        bytes.extend_from_slice(input.txid().as_bytes());
        bytes.extend_from_slice(&input.vout().to_le_bytes());
    }

    bytes.extend_from_slice(&(outputs.len() as u32).to_le_bytes());
    for output in outputs {
        let address = output.address().as_str();
        bytes.extend_from_slice(&(address.len() as u32).to_le_bytes());
        bytes.extend_from_slice(address.as_bytes());
        bytes.extend_from_slice(&output.amount().to_sat().to_le_bytes());
    }

    bytes.extend_from_slice(&fee.to_sat().to_le_bytes());
    bytes.extend_from_slice(&nonce.to_le_bytes());

    let hash = Sha256::digest(&bytes);
    let mut id = [0u8; 32];
    id.copy_from_slice(&hash);
    TxId(id)
}
