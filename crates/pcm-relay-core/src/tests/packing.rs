use crate::config::BitWidth;
use crate::transport::{pack_append, packed_len};

/// WHAT: 16-bit packing emits [LSB, MSB] of the slot's low 16 bits
/// WHY: Receivers decode the stream as little-endian i16
#[test]
fn given_16_bit_samples_when_packed_then_layout_is_le() {
    let samples = [0x1234i32, -2, 0x7FFF, -0x8000];
    let mut out = Vec::new();
    pack_append(&samples, BitWidth::B16, &mut out);

    assert_eq!(
        out,
        vec![0x34, 0x12, 0xFE, 0xFF, 0xFF, 0x7F, 0x00, 0x80]
    );
}

/// WHAT: Decoding the 16-bit stream recovers the original values
/// WHY: The packing round trip is the wire contract for the default format
#[test]
fn given_16_bit_stream_when_decoded_then_values_round_trip() {
    let samples: Vec<i32> = (-32768..=32767).step_by(257).collect();
    let mut out = Vec::new();
    pack_append(&samples, BitWidth::B16, &mut out);

    let decoded: Vec<i32> = out
        .chunks(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
        .collect();
    assert_eq!(decoded, samples);
}

/// WHAT: 24-bit packing is (slot>>8, slot>>16, slot>>24), low byte dropped
/// WHY: Downstream decoders depend on this exact layout; it must stay
/// bit-identical
#[test]
fn given_24_bit_samples_when_packed_then_low_byte_is_dropped() {
    let samples = [0x12345678i32];
    let mut out = Vec::new();
    pack_append(&samples, BitWidth::B24, &mut out);

    assert_eq!(out, vec![0x56, 0x34, 0x12]);
}

/// WHAT: Decoding the 24-bit stream recovers the slot's high 24 bits
/// WHY: The 24-bit value lives top-aligned in the 32-bit capture slot
#[test]
fn given_24_bit_stream_when_decoded_then_high_bits_round_trip() {
    let samples = [0x7FFFFF00i32, i32::MIN, 0x00000100, -256, 0x12345600];
    let mut out = Vec::new();
    pack_append(&samples, BitWidth::B24, &mut out);

    let decoded: Vec<i32> = out
        .chunks(3)
        .map(|b| (i32::from(b[0]) << 8) | (i32::from(b[1]) << 16) | (i32::from(b[2] as i8) << 24))
        .collect();
    let expected: Vec<i32> = samples.iter().map(|s| s & !0xFFi32).collect();
    assert_eq!(decoded, expected);
}

/// WHAT: 32-bit packing is four little-endian bytes per slot
/// WHY: Full-width streams ship the slot verbatim
#[test]
fn given_32_bit_samples_when_packed_then_layout_is_le() {
    let samples = [0x01020304i32, -1];
    let mut out = Vec::new();
    pack_append(&samples, BitWidth::B32, &mut out);

    assert_eq!(out, vec![0x04, 0x03, 0x02, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
}

/// WHAT: 8-bit packing keeps the low byte
/// WHY: Narrow streams mirror the 16-bit convention of low-aligned data
#[test]
fn given_8_bit_samples_when_packed_then_low_byte_kept() {
    let samples = [0x7Fi32, -1, 0];
    let mut out = Vec::new();
    pack_append(&samples, BitWidth::B8, &mut out);

    assert_eq!(out, vec![0x7F, 0xFF, 0x00]);
}

/// WHAT: packed_len matches the emitted byte count for every width
/// WHY: Packet sizing and the datagram bound derive from it
#[test]
fn given_each_width_when_packing_then_len_matches() {
    let samples = [1i32; 7];
    for width in [BitWidth::B8, BitWidth::B16, BitWidth::B24, BitWidth::B32] {
        let mut out = Vec::new();
        pack_append(&samples, width, &mut out);
        assert_eq!(out.len(), packed_len(samples.len(), width));
    }
}

/// WHAT: Packing appends without clearing the output
/// WHY: The datagram sender writes its header first, then the payload
#[test]
fn given_prefilled_buffer_when_packing_then_bytes_append() {
    let mut out = vec![0xAAu8; 4];
    pack_append(&[1i32], BitWidth::B16, &mut out);
    assert_eq!(out, vec![0xAA, 0xAA, 0xAA, 0xAA, 0x01, 0x00]);
}
