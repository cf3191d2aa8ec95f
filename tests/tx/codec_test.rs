// Transaction Codec Tests
// Raw encodings used to hand a signed transaction to another node

use txledger::tx::{Address, Amount, CodecError, OutPoint, Transaction, TransactionBuilder, TransactionCodec, TxId};

fn create_transaction() -> Transaction {
    TransactionBuilder::new()
        .input(OutPoint::new(TxId::from_label("foo"), 0))
        .input(OutPoint::new(TxId::from_label("bar"), 0))
        .output(Address::new("wallet1"), Amount::from_coins(740))
        .output(Address::new("wallet0"), "7.98".parse().unwrap())
        .fee("-0.02".parse().unwrap())
        .nonce(12345)
        .build()
        .expect("Should build valid transaction")
}

#[test]
fn test_binary_roundtrip_preserves_fields() {
    let original = create_transaction();

    let bytes = TransactionCodec::encode(&original).unwrap();
    let decoded = TransactionCodec::decode_verified(&bytes).unwrap();

    assert_eq!(decoded, original);
    assert_eq!(decoded.fee(), original.fee());
}

#[test]
fn test_hex_is_raw_transaction_form() {
    let original = create_transaction();

    let hex = TransactionCodec::encode_hex(&original).unwrap();

    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(TransactionCodec::decode_hex(&hex).unwrap(), original);
}

#[test]
fn test_base64_is_url_safe() {
    let original = create_transaction();

    let encoded = TransactionCodec::encode_base64(&original).unwrap();

    assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));
    assert_eq!(TransactionCodec::decode_base64(&encoded).unwrap(), original);
}

#[test]
fn test_invalid_inputs() {
    assert!(matches!(TransactionCodec::decode_hex("zz"), Err(CodecError::InvalidHex(_))));
    assert!(matches!(TransactionCodec::decode_base64("!!!"), Err(CodecError::InvalidBase64(_))));
    assert!(matches!(TransactionCodec::decode(&[0xff, 0xff]), Err(CodecError::DecodeError(_))));
}

#[test]
fn test_relabelled_transaction_fails_verification() {
    let original = create_transaction();
    let forged = Transaction::new(
        TxId::from_label("forged"),
        original.inputs().to_vec(),
        original.outputs().to_vec(),
        original.fee(),
    );

    let bytes = TransactionCodec::encode(&forged).unwrap();

    assert!(matches!(TransactionCodec::decode_verified(&bytes), Err(CodecError::IdMismatch)));
}
