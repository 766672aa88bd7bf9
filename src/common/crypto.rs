use sha3::{Digest, Keccak256};

/// Calculate Keccak256 hash, hex-encoded with 0x prefix
pub fn keccak256_hex(data: &[u8]) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// 4-byte function selector for a canonical signature, e.g. "totalSupply()"
pub fn function_selector(signature: &str) -> String {
    let hash = keccak256_hex(signature.as_bytes());
    hash[..10].to_string()
}
