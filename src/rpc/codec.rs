//! Call payload encoding and return-data decoding.
//!
//! Payload = 4-byte selector followed by one 32-byte word per argument.
//! Return data is read one word at a time; each call site knows which
//! shape it expects, nothing is introspected.

use crate::contracts::{ArgKind, CallSpec};
use crate::error::CodecError;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;

/// One argument word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallArg {
    Address(Address),
    Uint(U256),
}

impl CallArg {
    pub fn uint(value: u64) -> Self {
        CallArg::Uint(U256::from(value))
    }

    pub fn kind(&self) -> ArgKind {
        match self {
            CallArg::Address(_) => ArgKind::Address,
            CallArg::Uint(_) => ArgKind::Uint,
        }
    }

    /// Addresses are left-padded with zeros, integers big-endian
    pub fn to_word(&self) -> B256 {
        match self {
            CallArg::Address(addr) => addr.into_word(),
            CallArg::Uint(value) => B256::from(value.to_be_bytes::<32>()),
        }
    }
}

impl CallSpec {
    /// Build the raw call payload for this method
    pub fn encode(&self, args: &[CallArg]) -> Bytes {
        debug_assert_eq!(
            args.len(),
            self.args.len(),
            "{} takes {} arguments",
            self.name,
            self.args.len()
        );
        debug_assert!(
            args.iter().zip(self.args).all(|(arg, kind)| arg.kind() == *kind),
            "argument kinds do not match {}",
            self.name
        );

        let mut data = Vec::with_capacity(4 + 32 * args.len());
        data.extend_from_slice(&self.selector);
        for arg in args {
            data.extend_from_slice(arg.to_word().as_slice());
        }
        Bytes::from(data)
    }
}

/// Word `index` of the return data, zero-padded when the data is short
pub fn word(data: &[u8], index: usize) -> B256 {
    let start = index * 32;
    let mut out = [0u8; 32];
    if start < data.len() {
        let end = (start + 32).min(data.len());
        out[..end - start].copy_from_slice(&data[start..end]);
    }
    B256::from(out)
}

/// First word as a right-aligned address (low 20 bytes)
pub fn decode_address(data: &[u8]) -> Address {
    Address::from_word(word(data, 0))
}

/// First word as an unsigned integer
pub fn decode_uint(data: &[u8]) -> U256 {
    U256::from_be_bytes(word(data, 0).0)
}

/// First word as u64, saturating on overflow
pub fn decode_u64(data: &[u8]) -> u64 {
    let value = decode_uint(data);
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.to::<u64>()
    }
}

/// Decode an ERC-20 `symbol()` result.
///
/// Standard tokens return an ABI `string`; some older tokens return a
/// right-padded `bytes32` instead.
pub fn decode_string(data: &[u8]) -> Result<String, CodecError> {
    if data.is_empty() {
        return Err(CodecError::Empty);
    }
    if data.len() == 32 {
        return decode_bytes32_string(data);
    }
    String::abi_decode(data).map_err(|e| CodecError::Abi(e.to_string()))
}

fn decode_bytes32_string(data: &[u8]) -> Result<String, CodecError> {
    let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
    if trimmed.is_empty() {
        return Err(CodecError::InvalidString("empty bytes32 symbol".into()));
    }
    String::from_utf8(trimmed).map_err(|e| CodecError::InvalidString(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ERC20_BALANCE_OF, V1_GET_TOKEN_WITH_ID, V2_TOKEN0};
    use alloy::primitives::address;

    #[test]
    fn test_encode_address_argument_is_left_padded() {
        let account = address!("0x00000000000000000000000000000000deadbeef");
        let data = ERC20_BALANCE_OF.encode(&[CallArg::Address(account)]);

        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert_eq!(&data[16..], account.as_slice());
    }

    #[test]
    fn test_encode_uint_argument_is_big_endian() {
        let data = V1_GET_TOKEN_WITH_ID.encode(&[CallArg::uint(258)]);
        assert_eq!(data.len(), 36);
        assert_eq!(data[34], 1);
        assert_eq!(data[35], 2);
        assert!(data[4..34].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_without_arguments_is_selector_only() {
        assert_eq!(V2_TOKEN0.encode(&[]).as_ref(), &[0x0d, 0xfe, 0x16, 0x81]);
    }

    #[test]
    fn test_decode_address_takes_low_20_bytes() {
        let token = address!("0x6b175474e89094c44da98b954eedeac495271d0f");
        let ret = CallArg::Address(token).to_word();
        assert_eq!(decode_address(ret.as_slice()), token);
    }

    #[test]
    fn test_short_return_data_decodes_to_zero() {
        assert_eq!(decode_address(&[]), Address::ZERO);
        assert_eq!(decode_uint(&[]), U256::ZERO);
        assert_eq!(decode_u64(&[]), 0);
    }

    #[test]
    fn test_decode_u64_saturates() {
        let big = CallArg::Uint(U256::MAX).to_word();
        assert_eq!(decode_u64(big.as_slice()), u64::MAX);
        let small = CallArg::uint(42).to_word();
        assert_eq!(decode_u64(small.as_slice()), 42);
    }

    #[test]
    fn test_decode_abi_string() {
        let data = "WETH".to_string().abi_encode();
        assert_eq!(data.len(), 96);
        assert_eq!(decode_string(&data).unwrap(), "WETH");
    }

    #[test]
    fn test_decode_bytes32_symbol() {
        let mut raw = [0u8; 32];
        raw[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string(&raw).unwrap(), "MKR");
    }

    #[test]
    fn test_decode_string_rejects_garbage() {
        assert_eq!(decode_string(&[]), Err(CodecError::Empty));
        assert!(decode_string(&[0u8; 32]).is_err());

        // Offset points past the end of the data
        let mut data = vec![0u8; 64];
        data[31] = 0xff;
        assert!(matches!(decode_string(&data), Err(CodecError::Abi(_))));
    }
}
