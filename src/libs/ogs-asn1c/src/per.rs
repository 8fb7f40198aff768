//! Aligned PER (ITU-T X.691) codec
//!
//! Covers what the NGAP transfer containers use: constrained and extensible
//! INTEGER, ENUMERATED, CHOICE indices, length determinants up to 16K and
//! size-constrained OCTET STRING / BIT STRING. Fragmented lengths and
//! extension additions are rejected.

use bitvec::prelude::*;
use bytes::Bytes;
use thiserror::Error;

/// PER codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PerError {
    #[error("Buffer underflow: need {needed} bits, have {available}")]
    BufferUnderflow { needed: usize, available: usize },
    #[error("Value {value} outside {min}..={max}")]
    ConstraintViolation { value: i64, min: i64, max: i64 },
    #[error("CHOICE index {index} outside root (last {max})")]
    InvalidChoiceIndex { index: usize, max: usize },
    #[error("Invalid length: {length}")]
    InvalidLength { length: usize },
    #[error("Extension additions are not supported")]
    UnsupportedExtension,
    #[error("Decode error: {0}")]
    DecodeError(String),
}

pub type PerResult<T> = Result<T, PerError>;

/// Largest length determinant handled without fragmentation
pub const MAX_UNFRAGMENTED_LENGTH: usize = 16383;

/// Width in bits of `value` (0 for 0)
fn bit_width(value: u64) -> usize {
    (u64::BITS - value.leading_zeros()) as usize
}

/// Octets holding `value`, at least one
fn octet_width(value: u64) -> usize {
    bit_width(value).div_ceil(8).max(1)
}

// ============================================================================
// Constraints
// ============================================================================

/// Value range of a constrained INTEGER or ENUMERATED root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub min: i64,
    pub max: i64,
    pub extensible: bool,
}

/// Field layout of a constrained whole number (X.691 10.5.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Single-value range, nothing on the wire
    Empty,
    /// Unaligned bit field
    Bits(usize),
    /// Octet-aligned field of one or two octets
    Octets(usize),
    /// Octet count (1..=max) then that many aligned octets
    LengthPrefixed(usize),
}

impl Constraint {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max, extensible: false }
    }

    pub const fn extensible(min: i64, max: i64) -> Self {
        Self { min, max, extensible: true }
    }

    /// Number of values in the root, 0 for an empty range
    pub fn range(&self) -> u64 {
        if self.max < self.min {
            0
        } else {
            self.max.abs_diff(self.min) + 1
        }
    }

    /// Bits needed for the largest offset
    pub fn bits_needed(&self) -> usize {
        bit_width(self.range().saturating_sub(1))
    }

    fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Offset of `value` from the lower bound
    fn offset(&self, value: i64) -> PerResult<u64> {
        if self.contains(value) {
            Ok(value.abs_diff(self.min))
        } else {
            Err(PerError::ConstraintViolation {
                value,
                min: self.min,
                max: self.max,
            })
        }
    }

    fn layout(&self) -> Layout {
        match self.range() {
            0 | 1 => Layout::Empty,
            2..=255 => Layout::Bits(self.bits_needed()),
            256 => Layout::Octets(1),
            257..=65536 => Layout::Octets(2),
            _ => Layout::LengthPrefixed(self.bits_needed().div_ceil(8)),
        }
    }
}

/// SIZE constraint of an OCTET STRING or BIT STRING
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Fixed(usize),
    Range(usize, usize),
    Unconstrained,
}

// ============================================================================
// Encoder
// ============================================================================

/// APER encoder writing into a growable bit buffer
#[derive(Debug, Default)]
pub struct AperEncoder {
    buffer: BitVec<u8, Msb0>,
}

impl AperEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded octets; a trailing partial octet is zero padded
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buffer.into_vec())
    }

    pub fn align(&mut self) {
        let padding = (8 - self.buffer.len() % 8) % 8;
        self.buffer.resize(self.buffer.len() + padding, false);
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.buffer.push(bit);
    }

    /// The low `width` bits of `value`, most significant first
    pub fn write_bits(&mut self, value: u64, width: usize) {
        let bits = value.view_bits::<Msb0>();
        self.buffer.extend_from_bitslice(&bits[bits.len() - width..]);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_bitslice(bytes.view_bits::<Msb0>());
    }

    /// Constrained whole number (X.691 10.5)
    pub fn encode_constrained_whole_number(
        &mut self,
        value: i64,
        constraint: &Constraint,
    ) -> PerResult<()> {
        let offset = constraint.offset(value)?;

        match constraint.layout() {
            Layout::Empty => {}
            Layout::Bits(width) => self.write_bits(offset, width),
            Layout::Octets(octets) => {
                self.align();
                self.write_bits(offset, octets * 8);
            }
            Layout::LengthPrefixed(max_octets) => {
                let octets = octet_width(offset);
                let count = Constraint::new(1, max_octets as i64);
                self.encode_constrained_whole_number(octets as i64, &count)?;
                self.align();
                self.write_bits(offset, octets * 8);
            }
        }
        Ok(())
    }

    /// INTEGER; values outside an extensible root are not supported
    pub fn encode_integer(&mut self, value: i64, constraint: &Constraint) -> PerResult<()> {
        if constraint.extensible {
            if !constraint.contains(value) {
                return Err(PerError::UnsupportedExtension);
            }
            self.write_bit(false);
        }
        self.encode_constrained_whole_number(value, constraint)
    }

    /// Semi-constrained whole number with lower bound 0 (X.691 10.7)
    pub fn encode_semi_constrained_whole_number(&mut self, value: u64) -> PerResult<()> {
        let octets = octet_width(value);
        self.encode_length_determinant(octets)?;
        self.write_bits(value, octets * 8);
        Ok(())
    }

    /// Unconstrained length determinant (X.691 11.9.3.6)
    pub fn encode_length_determinant(&mut self, length: usize) -> PerResult<()> {
        self.align();
        match length {
            0..=127 => self.write_bits(length as u64, 8),
            128..=MAX_UNFRAGMENTED_LENGTH => self.write_bits(0x8000 | length as u64, 16),
            _ => return Err(PerError::InvalidLength { length }),
        }
        Ok(())
    }

    /// Length determinant with an upper bound below 64K
    pub fn encode_constrained_length(
        &mut self,
        length: usize,
        min: usize,
        max: usize,
    ) -> PerResult<()> {
        let bounds = Constraint::new(min as i64, max as i64);
        self.encode_constrained_whole_number(length as i64, &bounds)
            .map_err(|_| PerError::InvalidLength { length })
    }

    /// Normally small non-negative whole number (X.691 10.6)
    pub fn encode_normally_small_non_negative(&mut self, value: u64) -> PerResult<()> {
        let small = value < 64;
        self.write_bit(!small);
        if small {
            self.write_bits(value, 6);
            Ok(())
        } else {
            self.encode_semi_constrained_whole_number(value)
        }
    }

    /// ENUMERATED; indices past the root are encoded as extensions
    pub fn encode_enumerated(&mut self, value: i64, constraint: &Constraint) -> PerResult<()> {
        if !constraint.extensible {
            return self.encode_constrained_whole_number(value, constraint);
        }
        if value > constraint.max {
            self.write_bit(true);
            self.encode_normally_small_non_negative(value.abs_diff(constraint.max) - 1)
        } else {
            self.write_bit(false);
            self.encode_constrained_whole_number(value, constraint)
        }
    }

    /// CHOICE index over `num_alternatives` root alternatives
    pub fn encode_choice_index(
        &mut self,
        index: usize,
        num_alternatives: usize,
        extensible: bool,
    ) -> PerResult<()> {
        let in_root = index < num_alternatives;
        if extensible {
            self.write_bit(!in_root);
        }
        if in_root {
            let root = Constraint::new(0, num_alternatives as i64 - 1);
            return self.encode_constrained_whole_number(index as i64, &root);
        }
        if extensible {
            self.encode_normally_small_non_negative((index - num_alternatives) as u64)
        } else {
            Err(PerError::InvalidChoiceIndex {
                index,
                max: num_alternatives.saturating_sub(1),
            })
        }
    }

    /// Length prefix of a sized string. Contents longer than `aligned_over`
    /// units start on an octet boundary.
    fn encode_size(&mut self, length: usize, size: Size, aligned_over: usize) -> PerResult<()> {
        match size {
            Size::Fixed(fixed) => {
                if length != fixed {
                    return Err(PerError::InvalidLength { length });
                }
                if fixed > aligned_over {
                    self.align();
                }
            }
            Size::Range(min, max) => {
                self.encode_constrained_length(length, min, max)?;
                if max > aligned_over {
                    self.align();
                }
            }
            Size::Unconstrained => self.encode_length_determinant(length)?,
        }
        Ok(())
    }

    /// OCTET STRING (X.691 17)
    pub fn encode_octet_string(&mut self, data: &[u8], size: Size) -> PerResult<()> {
        self.encode_size(data.len(), size, 2)?;
        self.write_bytes(data);
        Ok(())
    }

    /// BIT STRING (X.691 16)
    pub fn encode_bit_string(&mut self, bits: &BitSlice<u8, Msb0>, size: Size) -> PerResult<()> {
        self.encode_size(bits.len(), size, 16)?;
        self.buffer.extend_from_bitslice(bits);
        Ok(())
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// APER decoder over a borrowed octet buffer
#[derive(Debug)]
pub struct AperDecoder<'a> {
    data: &'a BitSlice<u8, Msb0>,
    position: usize,
}

impl<'a> AperDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data: data.view_bits::<Msb0>(),
            position: 0,
        }
    }

    pub fn align(&mut self) {
        self.position = self.position.next_multiple_of(8);
    }

    fn take(&mut self, width: usize) -> PerResult<&'a BitSlice<u8, Msb0>> {
        let data: &'a BitSlice<u8, Msb0> = self.data;
        let available = data.len().saturating_sub(self.position);
        if width > available {
            return Err(PerError::BufferUnderflow {
                needed: width,
                available,
            });
        }
        let bits = &data[self.position..self.position + width];
        self.position += width;
        Ok(bits)
    }

    pub fn read_bit(&mut self) -> PerResult<bool> {
        Ok(self.take(1)?[0])
    }

    /// `width` bits as an unsigned value, most significant first
    pub fn read_bits(&mut self, width: usize) -> PerResult<u64> {
        if width > 64 {
            return Err(PerError::DecodeError(format!("{width}-bit field")));
        }
        let bits = self.take(width)?;
        Ok(if bits.is_empty() { 0 } else { bits.load_be::<u64>() })
    }

    pub fn read_bytes(&mut self, count: usize) -> PerResult<Vec<u8>> {
        let bits = self.take(count * 8)?;
        Ok(bits.chunks(8).map(|octet| octet.load_be::<u8>()).collect())
    }

    /// Constrained whole number (X.691 10.5)
    pub fn decode_constrained_whole_number(&mut self, constraint: &Constraint) -> PerResult<i64> {
        let offset = match constraint.layout() {
            Layout::Empty => 0,
            Layout::Bits(width) => self.read_bits(width)?,
            Layout::Octets(octets) => {
                self.align();
                self.read_bits(octets * 8)?
            }
            Layout::LengthPrefixed(max_octets) => {
                let count = Constraint::new(1, max_octets as i64);
                let octets = self.decode_constrained_whole_number(&count)? as usize;
                self.align();
                self.read_bits(octets * 8)?
            }
        };

        let value = i64::try_from(offset)
            .ok()
            .and_then(|offset| constraint.min.checked_add(offset))
            .filter(|value| constraint.contains(*value));
        value.ok_or(PerError::ConstraintViolation {
            value: constraint.min.saturating_add_unsigned(offset),
            min: constraint.min,
            max: constraint.max,
        })
    }

    /// INTEGER; an extension bit set means an unsupported addition
    pub fn decode_integer(&mut self, constraint: &Constraint) -> PerResult<i64> {
        if constraint.extensible && self.read_bit()? {
            return Err(PerError::UnsupportedExtension);
        }
        self.decode_constrained_whole_number(constraint)
    }

    /// Semi-constrained whole number with lower bound 0 (X.691 10.7)
    pub fn decode_semi_constrained_whole_number(&mut self) -> PerResult<u64> {
        let octets = self.decode_length_determinant()?;
        if octets == 0 || octets > 8 {
            return Err(PerError::InvalidLength { length: octets });
        }
        self.read_bits(octets * 8)
    }

    /// Unconstrained length determinant (X.691 11.9.3.6)
    pub fn decode_length_determinant(&mut self) -> PerResult<usize> {
        self.align();
        if !self.read_bit()? {
            return Ok(self.read_bits(7)? as usize);
        }
        if !self.read_bit()? {
            return Ok(self.read_bits(14)? as usize);
        }
        Err(PerError::DecodeError(
            "fragmented length determinant".to_string(),
        ))
    }

    pub fn decode_constrained_length(&mut self, min: usize, max: usize) -> PerResult<usize> {
        let bounds = Constraint::new(min as i64, max as i64);
        Ok(self.decode_constrained_whole_number(&bounds)? as usize)
    }

    /// Normally small non-negative whole number (X.691 10.6)
    pub fn decode_normally_small_non_negative(&mut self) -> PerResult<u64> {
        if self.read_bit()? {
            self.decode_semi_constrained_whole_number()
        } else {
            self.read_bits(6)
        }
    }

    /// ENUMERATED; extension indices continue after the root
    pub fn decode_enumerated(&mut self, constraint: &Constraint) -> PerResult<i64> {
        if constraint.extensible && self.read_bit()? {
            let addition = self.decode_normally_small_non_negative()?;
            return i64::try_from(addition)
                .ok()
                .and_then(|addition| (constraint.max + 1).checked_add(addition))
                .ok_or_else(|| PerError::DecodeError(format!("enumeration addition {addition}")));
        }
        self.decode_constrained_whole_number(constraint)
    }

    /// CHOICE index; extension alternatives continue after the root
    pub fn decode_choice_index(
        &mut self,
        num_alternatives: usize,
        extensible: bool,
    ) -> PerResult<usize> {
        if extensible && self.read_bit()? {
            let addition = self.decode_normally_small_non_negative()?;
            return Ok(num_alternatives + addition as usize);
        }
        let root = Constraint::new(0, num_alternatives as i64 - 1);
        Ok(self.decode_constrained_whole_number(&root)? as usize)
    }

    fn decode_size(&mut self, size: Size, aligned_over: usize) -> PerResult<usize> {
        let length = match size {
            Size::Fixed(fixed) => {
                if fixed > aligned_over {
                    self.align();
                }
                fixed
            }
            Size::Range(min, max) => {
                let length = self.decode_constrained_length(min, max)?;
                if max > aligned_over {
                    self.align();
                }
                length
            }
            Size::Unconstrained => self.decode_length_determinant()?,
        };
        Ok(length)
    }

    /// OCTET STRING (X.691 17)
    pub fn decode_octet_string(&mut self, size: Size) -> PerResult<Vec<u8>> {
        let length = self.decode_size(size, 2)?;
        self.read_bytes(length)
    }

    /// BIT STRING (X.691 16)
    pub fn decode_bit_string(&mut self, size: Size) -> PerResult<BitVec<u8, Msb0>> {
        let length = self.decode_size(size, 16)?;
        Ok(self.take(length)?.to_bitvec())
    }
}

// ============================================================================
// PDU Entry Points
// ============================================================================

pub trait AperEncode {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()>;
}

pub trait AperDecode: Sized {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self>;
}

/// Encode a complete value into octet-aligned bytes
pub fn encode_to_bytes<T: AperEncode + ?Sized>(value: &T) -> PerResult<Bytes> {
    let mut encoder = AperEncoder::new();
    value.encode_aper(&mut encoder)?;
    encoder.align();
    Ok(encoder.into_bytes())
}

pub fn decode_from_bytes<T: AperDecode>(bytes: &[u8]) -> PerResult<T> {
    T::decode_aper(&mut AperDecoder::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(write: impl FnOnce(&mut AperEncoder) -> PerResult<()>) -> Bytes {
        let mut encoder = AperEncoder::new();
        write(&mut encoder).unwrap();
        encoder.align();
        encoder.into_bytes()
    }

    #[test]
    fn test_bits_needed() {
        for (max, bits) in [(0, 0), (1, 1), (2, 2), (3, 2), (7, 3), (255, 8), (4_000_000_000_000, 42)] {
            assert_eq!(Constraint::new(0, max).bits_needed(), bits, "0..={max}");
        }
    }

    #[test]
    fn test_layouts() {
        assert_eq!(Constraint::new(5, 5).layout(), Layout::Empty);
        assert_eq!(Constraint::new(1, 15).layout(), Layout::Bits(4));
        assert_eq!(Constraint::new(0, 255).layout(), Layout::Octets(1));
        assert_eq!(Constraint::new(0, 65535).layout(), Layout::Octets(2));
        assert_eq!(
            Constraint::new(0, 4_000_000_000_000).layout(),
            Layout::LengthPrefixed(6)
        );
    }

    #[test]
    fn test_small_range_is_unaligned() {
        // ARP priority 1..15 then a 1-bit flag share the first octet
        let bytes = encoded(|e| {
            e.encode_constrained_whole_number(8, &Constraint::new(1, 15))?;
            e.write_bit(true);
            Ok(())
        });
        assert_eq!(bytes.as_ref(), &[0b0111_1000]);
    }

    #[test]
    fn test_out_of_range() {
        let mut encoder = AperEncoder::new();
        assert_eq!(
            encoder.encode_constrained_whole_number(64, &Constraint::new(0, 63)),
            Err(PerError::ConstraintViolation { value: 64, min: 0, max: 63 })
        );
        assert_eq!(
            encoder.encode_integer(64, &Constraint::extensible(0, 63)),
            Err(PerError::UnsupportedExtension)
        );
    }

    #[test]
    fn test_bit_rate_encoding() {
        // BitRate ::= INTEGER (0..4000000000000, ...)
        let bit_rate = Constraint::extensible(0, 4_000_000_000_000);

        let bytes = encoded(|e| e.encode_integer(100_000_000, &bit_rate));
        // ext 0, octet count 4 as 3 bits (offset 3), pad, 4 octets
        assert_eq!(bytes.as_ref(), &[0x30, 0x05, 0xF5, 0xE1, 0x00]);
        assert_eq!(AperDecoder::new(&bytes).decode_integer(&bit_rate), Ok(100_000_000));

        let zero = encoded(|e| e.encode_integer(0, &bit_rate));
        assert_eq!(zero.as_ref(), &[0x00, 0x00]);
    }

    #[test]
    fn test_length_determinant() {
        assert_eq!(encoded(|e| e.encode_length_determinant(5)).as_ref(), &[0x05]);
        assert_eq!(encoded(|e| e.encode_length_determinant(300)).as_ref(), &[0x81, 0x2C]);

        for len in [0, 127, 128, MAX_UNFRAGMENTED_LENGTH] {
            let bytes = encoded(|e| e.encode_length_determinant(len));
            assert_eq!(AperDecoder::new(&bytes).decode_length_determinant(), Ok(len));
        }

        let mut encoder = AperEncoder::new();
        assert_eq!(
            encoder.encode_length_determinant(MAX_UNFRAGMENTED_LENGTH + 1),
            Err(PerError::InvalidLength { length: MAX_UNFRAGMENTED_LENGTH + 1 })
        );
        assert!(matches!(
            AperDecoder::new(&[0xC1]).decode_length_determinant(),
            Err(PerError::DecodeError(_))
        ));
    }

    #[test]
    fn test_semi_constrained() {
        for (value, expected) in [
            (0u64, vec![0x01, 0x00]),
            (128, vec![0x01, 0x80]),
            (256, vec![0x02, 0x01, 0x00]),
        ] {
            let bytes = encoded(|e| e.encode_semi_constrained_whole_number(value));
            assert_eq!(bytes.as_ref(), expected.as_slice(), "value {value}");
            assert_eq!(
                AperDecoder::new(&bytes).decode_semi_constrained_whole_number(),
                Ok(value)
            );
        }
    }

    #[test]
    fn test_enumerated_extension() {
        let root = Constraint::extensible(0, 2);
        let bytes = encoded(|e| {
            e.encode_enumerated(2, &root)?;
            e.encode_enumerated(4, &root)
        });

        let mut decoder = AperDecoder::new(&bytes);
        assert_eq!(decoder.decode_enumerated(&root), Ok(2));
        assert_eq!(decoder.decode_enumerated(&root), Ok(4));
    }

    #[test]
    fn test_choice_index() {
        let bytes = encoded(|e| e.encode_choice_index(3, 5, true));
        // ext 0, index 3 in 3 bits
        assert_eq!(bytes.as_ref(), &[0b0011_0000]);
        assert_eq!(AperDecoder::new(&bytes).decode_choice_index(5, true), Ok(3));

        let mut encoder = AperEncoder::new();
        assert_eq!(
            encoder.encode_choice_index(2, 2, false),
            Err(PerError::InvalidChoiceIndex { index: 2, max: 1 })
        );
    }

    #[test]
    fn test_octet_string() {
        let teid = [0x01, 0x02, 0x03, 0x04];
        let bytes = encoded(|e| {
            e.write_bit(true);
            e.encode_octet_string(&teid, Size::Fixed(4))?;
            e.encode_octet_string(&teid, Size::Unconstrained)
        });
        assert_eq!(bytes.as_ref(), &[0x80, 1, 2, 3, 4, 4, 1, 2, 3, 4]);

        let mut decoder = AperDecoder::new(&bytes);
        assert_eq!(decoder.read_bit(), Ok(true));
        assert_eq!(decoder.decode_octet_string(Size::Fixed(4)), Ok(teid.to_vec()));
        assert_eq!(decoder.decode_octet_string(Size::Unconstrained), Ok(teid.to_vec()));

        let mut encoder = AperEncoder::new();
        assert_eq!(
            encoder.encode_octet_string(&[1, 2, 3], Size::Fixed(4)),
            Err(PerError::InvalidLength { length: 3 })
        );
    }

    #[test]
    fn test_bit_string() {
        let address = BitVec::<u8, Msb0>::from_slice(&[10, 0, 0, 1]);
        let bytes = encoded(|e| e.encode_bit_string(&address, Size::Range(1, 160)));
        // length 32 as offset 31 in 8 bits, then the aligned contents
        assert_eq!(bytes.as_ref(), &[31, 10, 0, 0, 1]);
        assert_eq!(
            AperDecoder::new(&bytes).decode_bit_string(Size::Range(1, 160)),
            Ok(address)
        );
    }

    #[test]
    fn test_underflow() {
        let mut decoder = AperDecoder::new(&[0xFF]);
        assert_eq!(
            decoder.read_bits(9),
            Err(PerError::BufferUnderflow { needed: 9, available: 8 })
        );
        assert_eq!(decoder.read_bytes(1), Ok(vec![0xFF]));
        assert!(decoder.read_bit().is_err());
    }
}
