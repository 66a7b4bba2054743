use sha3::{Digest, Keccak256};

const ADDRESS_HEX_LEN: usize = 40;

/// 校验 `0x` 前缀的 20 字节十六进制地址；大小写混合时要求满足 EIP-55 校验和。
pub fn is_hex_address(value: &str) -> bool {
    let Some(body) = value.strip_prefix("0x") else {
        return false;
    };
    if body.len() != ADDRESS_HEX_LEN || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }

    to_checksum_address(body).is_some_and(|checksummed| checksummed == value)
}

/// 返回 EIP-55 大小写编码后的地址，输入可带或不带 `0x` 前缀。
pub fn to_checksum_address(value: &str) -> Option<String> {
    let body = value.strip_prefix("0x").unwrap_or(value);
    if body.len() != ADDRESS_HEX_LEN || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let lower = body.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(ADDRESS_HEX_LEN + 2);
    out.push_str("0x");
    for (index, ch) in lower.chars().enumerate() {
        let byte = hash[index / 2];
        let nibble = if index % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_case_addresses() {
        assert!(is_hex_address("0x0000000000000000000000000000000000000001"));
        assert!(is_hex_address("0x5ffdaab0373e62e2ea2944776209aef29e631a64"));
        assert!(is_hex_address("0x5FFDAAB0373E62E2EA2944776209AEF29E631A64"));
    }

    #[test]
    fn validates_mixed_case_checksum() {
        assert!(is_hex_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(is_hex_address("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"));
        assert!(!is_hex_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD"));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(!is_hex_address(""));
        assert!(!is_hex_address("0x"));
        assert!(!is_hex_address("0000000000000000000000000000000000000001"));
        assert!(!is_hex_address("0x00000000000000000000000000000000000001"));
        assert!(!is_hex_address("0xzz00000000000000000000000000000000000001"));
        assert!(!is_hex_address("not-an-address"));
    }

    #[test]
    fn checksum_round_trip() {
        let checksummed =
            to_checksum_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").expect("checksum");
        assert_eq!(checksummed, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert!(to_checksum_address("0x1234").is_none());
    }
}
