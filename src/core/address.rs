use rand::Rng;

/// Number of hex digits after the `0x` prefix
pub const ADDRESS_HEX_LEN: usize = 40;

/// Check that `s` is a canonical-form identity address
///
/// Accepts exactly `0x` followed by 40 hexadecimal characters, either case.
/// An uppercase `0X` prefix is rejected.
#[inline]
pub fn validate(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(hex) => hex.len() == ADDRESS_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Structural equality ignoring letter case
#[inline]
pub fn equals_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Lowercased form used as a storage key
pub fn normalize(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Order-independent key for an unordered pair of addresses
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    let a = normalize(a);
    let b = normalize(b);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Generate a random canonical-form address
pub fn random_address() -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();

    let mut address = String::with_capacity(ADDRESS_HEX_LEN + 2);
    address.push_str("0x");
    for _ in 0..ADDRESS_HEX_LEN {
        address.push(HEX[rng.gen_range(0..16)] as char);
    }
    address
}

/// `validator` hook for request and record fields holding an address
pub fn validate_field(value: &str) -> Result<(), validator::ValidationError> {
    if validate(value) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("address");
        err.message = Some("expected 0x followed by 40 hex characters".into());
        Err(err)
    }
}
