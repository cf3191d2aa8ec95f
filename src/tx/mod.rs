// Tx module - THE PAYMENT RECORD
// Transaction model, fixed-point amounts, builder, validation and raw encodings

mod amount;
mod builder;
mod codec;
mod model;
mod validator;

pub use amount::{Amount, COIN};
pub use builder::{BuilderError, TransactionBuilder};
pub use codec::{CodecError, TransactionCodec};
pub use model::{Address, OutPoint, Transaction, TxId, TxOutput};
pub use validator::{TransactionValidator, ValidationError};
