//! Fixed USB descriptor bytes for the UAC1 speaker configuration (spec §6).
//!
//! Byte layout, lengths and subtype codes are fixed by the USB Audio Class
//! 1.0 spec and are carried here exactly as the original firmware's
//! `USBD_AUDIO_CfgDesc`/`USBD_AUDIO_DeviceQualifierDesc` tables describe them;
//! only the three fields that vary with the compiled-in sample rate (the
//! tSamFreq triplet) and the two packet sizes are patched in at `build()`
//! time rather than baked into the static bytes.

pub const CONFIG_DESC_SIZE: usize = 118;
pub const DEVICE_QUALIFIER_SIZE: usize = 10;

/// bDescriptorType for class-specific AUDIO descriptors returned from a
/// class GET_DESCRIPTOR request (spec §4.D).
pub const AUDIO_DESCRIPTOR_TYPE: u8 = 0x21;

pub const AC_INTERFACE_NUMBER: u8 = 0;
pub const AS_INTERFACE_NUMBER: u8 = 1;
pub const OUT_ENDPOINT: u8 = 0x01;
pub const FEEDBACK_ENDPOINT: u8 = 0x82;

/// Offset of the class-specific AC interface header within the config
/// descriptor: this is what a class GET_DESCRIPTOR(AUDIO) request returns
/// (spec §4.D "class-specific GET_DESCRIPTOR").
pub const AC_HEADER_OFFSET: usize = 18;
pub const AC_HEADER_LEN: usize = 9;

/// Offset of the 3-byte little-endian tSamFreq field inside the Format
/// Type I descriptor.
const FREQ_OFFSET: usize = 90;
/// Offset of the 2-byte wMaxPacketSize field of the OUT endpoint descriptor.
const OUT_WMAXPACKETSIZE_OFFSET: usize = 97;

const TEMPLATE: [u8; CONFIG_DESC_SIZE] = [
    // Configuration descriptor (9)
    0x09, 0x02, (CONFIG_DESC_SIZE & 0xFF) as u8, (CONFIG_DESC_SIZE >> 8) as u8,
    0x02, 0x01, 0x00, 0x80, 0x32,
    // Standard AC interface descriptor (9)
    0x09, 0x04, AC_INTERFACE_NUMBER, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00,
    // Class-specific AC interface header (9) -- AC_HEADER_OFFSET == 18.
    // wTotalLength = 0x27 (39) covers only the four class-specific AC
    // descriptors that follow: this header, the Input Terminal, the
    // Feature Unit and the Output Terminal (9+12+9+9).
    0x09, 0x24, 0x01, 0x00, 0x01, 0x27, 0x00, 0x01, AS_INTERFACE_NUMBER,
    // Input terminal (12): bTerminalID=1, type 0x0101 (USB streaming), mono.
    0x0C, 0x24, 0x02, 0x01, 0x01, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
    // Feature Unit (9): bUnitID=2, sourced from terminal 1, 1-byte control
    // bitmap with the MUTE bit set.
    0x09, 0x24, 0x06, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00,
    // Output terminal (9): bTerminalID=3, type 0x0301 (speaker), sourced
    // from Feature Unit 2.
    0x09, 0x24, 0x03, 0x03, 0x01, 0x03, 0x00, 0x02, 0x00,
    // Standard AS interface, alt 0, zero bandwidth (9)
    0x09, 0x04, AS_INTERFACE_NUMBER, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00,
    // Standard AS interface, alt 1, operational (9)
    0x09, 0x04, AS_INTERFACE_NUMBER, 0x01, 0x02, 0x01, 0x02, 0x00, 0x00,
    // Class-specific AS general (7)
    0x07, 0x24, 0x01, 0x01, 0x01, 0x01, 0x00,
    // Format type I, one sample rate (11)
    0x0B, 0x24, 0x02, 0x01, 0x02, 0x02, 0x10, 0x01,
    /* tSamFreq (3) -- FREQ_OFFSET == 90 */ 0x00, 0x00, 0x00,
    // Standard OUT endpoint (9)
    0x09, 0x05, OUT_ENDPOINT, 0x05,
    /* wMaxPacketSize (2) -- OUT_WMAXPACKETSIZE_OFFSET == 97 */ 0x00, 0x00,
    0x01, 0x00, FEEDBACK_ENDPOINT,
    // Class-specific AS isochronous audio data endpoint (7)
    0x07, 0x25, 0x01, 0x00, 0x00, 0x00, 0x00,
    // Standard feedback IN endpoint (9)
    0x09, 0x05, FEEDBACK_ENDPOINT, 0x11, 0x03, 0x00, 0x01, 0x00, 0x00,
];

pub const DEVICE_QUALIFIER: [u8; DEVICE_QUALIFIER_SIZE] =
    [0x0A, 0x06, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x01, 0x00];

/// Build the config descriptor for the given sample rate and OUT packet
/// size, patching the variable fields into the fixed template.
pub fn build_config_descriptor(freq_hz: u32, out_max_packet: u16) -> [u8; CONFIG_DESC_SIZE] {
    let mut d = TEMPLATE;
    d[FREQ_OFFSET] = (freq_hz & 0xFF) as u8;
    d[FREQ_OFFSET + 1] = ((freq_hz >> 8) & 0xFF) as u8;
    d[FREQ_OFFSET + 2] = ((freq_hz >> 16) & 0xFF) as u8;
    d[OUT_WMAXPACKETSIZE_OFFSET] = (out_max_packet & 0xFF) as u8;
    d[OUT_WMAXPACKETSIZE_OFFSET + 1] = (out_max_packet >> 8) as u8;
    d
}

/// Slice of the config descriptor returned for a class-specific
/// GET_DESCRIPTOR(AUDIO) request (spec §4.D).
pub fn class_specific_ac_header(desc: &[u8; CONFIG_DESC_SIZE]) -> &[u8] {
    &desc[AC_HEADER_OFFSET..AC_HEADER_OFFSET + AC_HEADER_LEN]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario1_cold_enumeration_header_bytes() {
        let desc = build_config_descriptor(48_000, 192);
        assert_eq!(&desc[0..4], &[0x09, 0x02, 0x76, 0x00]);
        assert_eq!(desc.len(), 118);
    }

    #[test]
    fn feature_unit_sits_between_input_and_output_terminal() {
        let desc = build_config_descriptor(48_000, 192);
        // Feature Unit: bUnitID=2, sourced from terminal 1, MUTE control bit.
        assert_eq!(&desc[39..48], &[0x09, 0x24, 0x06, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00]);
        // Output Terminal now sourced from the Feature Unit, not the input
        // terminal directly.
        assert_eq!(&desc[48..57], &[0x09, 0x24, 0x03, 0x03, 0x01, 0x03, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn ac_header_collection_length_covers_feature_unit() {
        let desc = build_config_descriptor(48_000, 192);
        let hdr = class_specific_ac_header(&desc);
        assert_eq!(&hdr[5..7], &[0x27, 0x00]); // wTotalLength = 39
    }

    #[test]
    fn format_type_i_declares_one_discrete_sample_rate() {
        let desc = build_config_descriptor(48_000, 192);
        assert_eq!(desc[89], 0x01); // bSamFreqType
    }

    #[test]
    fn device_qualifier_is_ten_bytes() {
        assert_eq!(DEVICE_QUALIFIER.len(), 10);
        assert_eq!(DEVICE_QUALIFIER[0], 0x0A);
        assert_eq!(DEVICE_QUALIFIER[1], 0x06);
    }

    #[test]
    fn freq_field_round_trips() {
        let desc = build_config_descriptor(44_100, 176);
        let freq = desc[FREQ_OFFSET] as u32
            | (desc[FREQ_OFFSET + 1] as u32) << 8
            | (desc[FREQ_OFFSET + 2] as u32) << 16;
        assert_eq!(freq, 44_100);
    }

    #[test]
    fn packet_size_field_round_trips() {
        let desc = build_config_descriptor(96_000, 384);
        let sz = desc[OUT_WMAXPACKETSIZE_OFFSET] as u16
            | (desc[OUT_WMAXPACKETSIZE_OFFSET + 1] as u16) << 8;
        assert_eq!(sz, 384);
    }

    #[test]
    fn ac_header_slice_matches_template() {
        let desc = build_config_descriptor(48_000, 192);
        let hdr = class_specific_ac_header(&desc);
        assert_eq!(hdr[0], 0x09);
        assert_eq!(hdr[1], 0x24);
        assert_eq!(hdr[2], 0x01); // HEADER subtype
    }
}
