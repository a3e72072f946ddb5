use crate::prelude::{Error, SdResult};

pub type Address = u64;

/// Parses an integer literal the way C's strtoul with base 0 does:
/// 0x/0X is hex, a leading 0 is octal, anything else is decimal.
pub fn parse_address(input: &str) -> SdResult<Address> {
    let text = input.trim();
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    // from_str_radix would accept a sign
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(Error::InvalidAddress(input.into()));
    }

    Address::from_str_radix(digits, radix).map_err(|_| Error::InvalidAddress(input.into()))
}
