#![allow(missing_docs)]
use otp_core::crypto;
use proptest::prelude::*;

#[test]
fn test_encryption_decryption_roundtrip() {
    let plaintext = b"Hello, world!";
    let pad = (0..plaintext.len()).map(|i| ((i * 7) % 256) as u8).collect::<Vec<u8>>();

    let ciphertext = crypto::encrypt(plaintext, &pad).unwrap();
    let decrypted_plaintext = crypto::decrypt(&ciphertext, &pad).unwrap();

    assert_eq!(plaintext, &decrypted_plaintext[..]);
}

#[test]
fn test_wrong_pad_does_not_validate() {
    let record = b"Alert,40.7128,-74.0060,Target secure";
    let right = (0..1024).map(|i| ((i * 31 + 7) % 256) as u8).collect::<Vec<u8>>();
    let wrong = (0..1024).map(|i| ((i * 13 + 101) % 256) as u8).collect::<Vec<u8>>();

    let ciphertext = crypto::encrypt(record, &right).unwrap();
    assert_eq!(ciphertext.len(), record.len());
    assert!(crypto::validate_plaintext_shape(&crypto::decrypt(&ciphertext, &right).unwrap()));
    assert!(!crypto::validate_plaintext_shape(&crypto::decrypt(&ciphertext, &wrong).unwrap()));
}

proptest! {
    #[test]
    fn xor_is_an_involution(pairs in prop::collection::vec(any::<(u8, u8)>(), 0..512)) {
        let (plaintext, key): (Vec<u8>, Vec<u8>) = pairs.into_iter().unzip();
        let ciphertext = crypto::encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(crypto::decrypt(&ciphertext, &key).unwrap(), plaintext);
    }

    #[test]
    fn shorter_key_is_always_rejected(data in prop::collection::vec(any::<u8>(), 1..256)) {
        let key = &data[..data.len() - 1];
        prop_assert!(crypto::encrypt(&data, key).is_err());
    }
}
