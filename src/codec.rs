//! Endian-parametric int/bytes packing, hex/bin/repr/eval text codecs, and xor.
//!
//! Mirrors zio.py's `l8/l16/l32/l64`, `b8/b16/b32/b64`, `hex2bytes`/`bytes2hex`,
//! `bin2bytes`/`bytes2bin`, `REPR`/`EVAL` and `xor`.

use crate::error::{ZioError, ZioResult};

/// Byte order for `pack`/`unpack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Unit width in bits for `pack`/`unpack`; always a multiple of 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }
}

/// Which side to pad a trailing under-length fragment on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadSide {
    Left,
    Right,
}

/// Converts a sequence of unit-sized integers back into bytes.
///
/// `values` are masked to `width` and written in `endian` order, concatenated
/// in order. This is the inverse of [`unpack`] when no autopad was applied.
pub fn pack(endian: Endian, width: Width, values: &[u64]) -> Vec<u8> {
    let n = width.bytes();
    let mut out = Vec::with_capacity(values.len() * n);
    for &v in values {
        let full = v.to_le_bytes();
        let mut unit = full[..n].to_vec();
        if endian == Endian::Big {
            unit.reverse();
        }
        out.extend_from_slice(&unit);
    }
    out
}

/// Converts bytes into a sequence of unit-sized integers.
///
/// Fails with [`ZioError::Encoding`] unless `bytes.len()` is a multiple of the
/// unit size, unless `autopad` is set — in which case the trailing fragment is
/// zero-padded on the low-address side for little-endian, high-address side
/// for big-endian (per §4.1's autopad rule), before unpacking.
pub fn unpack(endian: Endian, width: Width, bytes: &[u8], autopad: bool) -> ZioResult<Vec<u64>> {
    let n = width.bytes();
    let padded;
    let bytes = if bytes.len() % n != 0 {
        if !autopad {
            return Err(ZioError::encoding(format!(
                "byte length {} is not a multiple of unit size {}",
                bytes.len(),
                n
            )));
        }
        let pad = n - (bytes.len() % n);
        let mut v = bytes.to_vec();
        match endian {
            Endian::Little => v.extend(std::iter::repeat(0u8).take(pad)),
            Endian::Big => {
                let mut front = vec![0u8; pad];
                front.extend_from_slice(bytes);
                v = front;
            }
        }
        padded = v;
        &padded[..]
    } else {
        bytes
    };

    let mut out = Vec::with_capacity(bytes.len() / n);
    for chunk in bytes.chunks(n) {
        let mut buf = [0u8; 8];
        match endian {
            Endian::Little => buf[..n].copy_from_slice(chunk),
            Endian::Big => {
                let mut rev = chunk.to_vec();
                rev.reverse();
                buf[..n].copy_from_slice(&rev);
            }
        }
        out.push(u64::from_le_bytes(buf));
    }
    Ok(out)
}

/// Unpacks a single unit; fails if `bytes.len() != width.bytes()` and autopad
/// would yield more than one unit back.
pub fn unpack_one(endian: Endian, width: Width, bytes: &[u8], autopad: bool) -> ZioResult<u64> {
    let values = unpack(endian, width, bytes, autopad)?;
    values
        .first()
        .copied()
        .ok_or_else(|| ZioError::encoding("empty input to unpack_one"))
}

macro_rules! convenience_pair {
    ($pack_name:ident, $unpack_name:ident, $endian:expr, $width:expr) => {
        #[doc = "Convenience binding over `pack`/`unpack_one`."]
        pub fn $pack_name(value: u64) -> Vec<u8> {
            pack($endian, $width, &[value])
        }
        pub fn $unpack_name(bytes: &[u8], autopad: bool) -> ZioResult<u64> {
            unpack_one($endian, $width, bytes, autopad)
        }
    };
}

convenience_pair!(l8, u_l8, Endian::Little, Width::W8);
convenience_pair!(l16, u_l16, Endian::Little, Width::W16);
convenience_pair!(l32, u_l32, Endian::Little, Width::W32);
convenience_pair!(l64, u_l64, Endian::Little, Width::W64);
convenience_pair!(b8, u_b8, Endian::Big, Width::W8);
convenience_pair!(b16, u_b16, Endian::Big, Width::W16);
convenience_pair!(b32, u_b32, Endian::Big, Width::W32);
convenience_pair!(b64, u_b64, Endian::Big, Width::W64);

/// Lowercase, unpadded hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Decodes whitespace-trimmed hex, optionally autopadding an odd-length input
/// with one `'0'` nibble, on the left by default.
pub fn hex_decode(s: &str, autopad: bool, pad_side: PadSide) -> ZioResult<Vec<u8>> {
    let trimmed: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let padded = if trimmed.len() % 2 != 0 {
        if !autopad {
            return Err(ZioError::encoding("odd-length hex string without autopad"));
        }
        match pad_side {
            PadSide::Left => format!("0{}", trimmed),
            PadSide::Right => format!("{}0", trimmed),
        }
    } else {
        trimmed
    };

    let mut out = Vec::with_capacity(padded.len() / 2);
    let chars: Vec<char> = padded.chars().collect();
    for pair in chars.chunks(2) {
        let s: String = pair.iter().collect();
        let byte = u8::from_str_radix(&s, 16)
            .map_err(|_| ZioError::encoding(format!("invalid hex digits '{}'", s)))?;
        out.push(byte);
    }
    Ok(out)
}

/// Space-separated 8-bit groups, MSB first, per byte.
pub fn bin_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Filters input down to `{'0','1'}`, then requires a multiple of 8 bits,
/// optionally left/right zero-autopadding the remainder.
pub fn bin_decode(s: &str, autopad: bool, pad_side: PadSide) -> ZioResult<Vec<u8>> {
    let bits: String = s.chars().filter(|&c| c == '0' || c == '1').collect();
    let padded = if bits.len() % 8 != 0 {
        if !autopad {
            return Err(ZioError::encoding(
                "bit string length is not a multiple of 8 without autopad",
            ));
        }
        let pad = 8 - (bits.len() % 8);
        match pad_side {
            PadSide::Left => format!("{}{}", "0".repeat(pad), bits),
            PadSide::Right => format!("{}{}", bits, "0".repeat(pad)),
        }
    } else {
        bits
    };

    let mut out = Vec::with_capacity(padded.len() / 8);
    let chars: Vec<char> = padded.chars().collect();
    for byte_bits in chars.chunks(8) {
        let s: String = byte_bits.iter().collect();
        let byte = u8::from_str_radix(&s, 2)
            .map_err(|_| ZioError::encoding(format!("invalid bit group '{}'", s)))?;
        out.push(byte);
    }
    Ok(out)
}

/// Unambiguous textual form of a byte string, followed by CR LF.
///
/// Printable ASCII (`0x20..=0x7e`) passes through save for `\`, `'`, `"`;
/// `\t`, `\n`, `\r` become their short escapes; anything else becomes `\xHH`.
pub fn repr_encode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    for &b in bytes {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x20..=0x7e => out.push(b),
            _ => out.extend_from_slice(format!("\\x{:02x}", b).as_bytes()),
        }
    }
    out.extend_from_slice(b"\r\n");
    out
}

/// Inverse of [`repr_encode`] over a deliberately restricted escape alphabet:
/// `\\`, `\'`, `\"`, `\t`, `\n`, `\r`, `\xHH`. Any other escape is an error.
/// Never executes code; never recognises octal or unicode escapes.
pub fn eval_decode(input: &[u8]) -> ZioResult<Vec<u8>> {
    let s = input
        .strip_suffix(b"\r\n")
        .or_else(|| input.strip_suffix(b"\n"))
        .unwrap_or(input);

    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        if s[i] != b'\\' {
            out.push(s[i]);
            i += 1;
            continue;
        }
        let next = *s.get(i + 1).ok_or_else(|| {
            ZioError::encoding("dangling escape at end of input".to_string())
        })?;
        match next {
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b'\'' => {
                out.push(b'\'');
                i += 2;
            }
            b'"' => {
                out.push(b'"');
                i += 2;
            }
            b't' => {
                out.push(b'\t');
                i += 2;
            }
            b'n' => {
                out.push(b'\n');
                i += 2;
            }
            b'r' => {
                out.push(b'\r');
                i += 2;
            }
            b'x' => {
                let hh = s.get(i + 2..i + 4).ok_or_else(|| {
                    ZioError::encoding("truncated \\xHH escape".to_string())
                })?;
                let hs = std::str::from_utf8(hh)
                    .map_err(|_| ZioError::encoding("non-ascii \\xHH escape".to_string()))?;
                let byte = u8::from_str_radix(hs, 16)
                    .map_err(|_| ZioError::encoding(format!("invalid \\x{} escape", hs)))?;
                out.push(byte);
                i += 4;
            }
            other => {
                return Err(ZioError::encoding(format!(
                    "unsupported escape '\\{}'",
                    other as char
                )));
            }
        }
    }
    Ok(out)
}

/// `a XOR (b repeated to |a|)`. Requires `|a| >= |b| > 0`.
pub fn xor(a: &[u8], b: &[u8]) -> ZioResult<Vec<u8>> {
    if b.is_empty() {
        return Err(ZioError::encoding("xor key must be non-empty"));
    }
    if a.len() < b.len() {
        return Err(ZioError::encoding("xor key must not be longer than input"));
    }
    Ok(a.iter()
        .enumerate()
        .map(|(i, &x)| x ^ b[i % b.len()])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        for &(endian, width) in &[
            (Endian::Little, Width::W8),
            (Endian::Little, Width::W16),
            (Endian::Little, Width::W32),
            (Endian::Little, Width::W64),
            (Endian::Big, Width::W8),
            (Endian::Big, Width::W16),
            (Endian::Big, Width::W32),
            (Endian::Big, Width::W64),
        ] {
            let values = [1u64, 2, 3, 255, 65535];
            let bytes = pack(endian, width, &values);
            let back = unpack(endian, width, &bytes, false).unwrap();
            let masked: Vec<u64> = values
                .iter()
                .map(|&v| {
                    let n = width.bytes();
                    if n == 8 {
                        v
                    } else {
                        v & ((1u64 << (n * 8)) - 1)
                    }
                })
                .collect();
            assert_eq!(back, masked);
        }
    }

    #[test]
    fn l32_roundtrip() {
        let packed = l32(0xdeadbeef);
        assert_eq!(packed, vec![0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(u_l32(&packed, false).unwrap(), 0xdeadbeef);
    }

    #[test]
    fn b32_roundtrip() {
        let packed = b32(0xdeadbeef);
        assert_eq!(packed, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(u_b32(&packed, false).unwrap(), 0xdeadbeef);
    }

    #[test]
    fn unpack_rejects_unaligned_without_autopad() {
        assert!(unpack(Endian::Little, Width::W32, &[1, 2, 3], false).is_err());
    }

    #[test]
    fn unpack_autopads_little_endian_low_side() {
        let v = unpack(Endian::Little, Width::W16, &[0xff], true).unwrap();
        assert_eq!(v, vec![0x00ff]);
    }

    #[test]
    fn unpack_autopads_big_endian_high_side() {
        let v = unpack(Endian::Big, Width::W16, &[0xff], true).unwrap();
        assert_eq!(v, vec![0x00ff]);
    }

    #[test]
    fn hex_roundtrip() {
        let b: Vec<u8> = (0..=255).collect();
        assert_eq!(hex_decode(&hex_encode(&b), false, PadSide::Left).unwrap(), b);
    }

    #[test]
    fn hex_encode_is_lowercase() {
        assert_eq!(hex_encode(&[0xde, 0xad]), "dead");
    }

    #[test]
    fn hex_decode_autopads_odd_length() {
        assert_eq!(hex_decode("f", true, PadSide::Left).unwrap(), vec![0x0f]);
        assert_eq!(hex_decode("f", true, PadSide::Right).unwrap(), vec![0xf0]);
    }

    #[test]
    fn hex_decode_rejects_odd_without_autopad() {
        assert!(hex_decode("f", false, PadSide::Left).is_err());
    }

    #[test]
    fn bin_roundtrip() {
        let b = b"hello zio".to_vec();
        let encoded = bin_encode(&b);
        assert_eq!(bin_decode(&encoded, false, PadSide::Left).unwrap(), b);
    }

    #[test]
    fn bin_decode_filters_non_bit_chars() {
        assert_eq!(
            bin_decode("0100 1000 garbage", false, PadSide::Left).unwrap(),
            vec![0x48]
        );
    }

    #[test]
    fn repr_eval_roundtrip_printable_and_escapes() {
        let b = b"hello\tworld\n\r\\'\"\x01".to_vec();
        let repr = repr_encode(&b);
        assert!(repr.ends_with(b"\r\n"));
        assert_eq!(eval_decode(&repr).unwrap(), b);
    }

    #[test]
    fn eval_rejects_unknown_escape() {
        assert!(eval_decode(b"\\q").is_err());
    }

    #[test]
    fn eval_rejects_octal_and_unicode_escapes() {
        assert!(eval_decode(b"\\101").is_err());
        assert!(eval_decode(b"\\u0041").is_err());
    }

    #[test]
    fn xor_is_involutive() {
        let a = b"attack at dawn".to_vec();
        let k = b"key".to_vec();
        let enc = xor(&a, &k).unwrap();
        let dec = xor(&enc, &k).unwrap();
        assert_eq!(dec, a);
    }

    #[test]
    fn xor_rejects_empty_key_or_oversize_key() {
        assert!(xor(b"abc", b"").is_err());
        assert!(xor(b"a", b"bc").is_err());
    }
}
