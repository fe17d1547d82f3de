//! Sample-rate universe and buffer-size tables shared by the driver and the panel.

/// Standard rates and their bit in the supported-rate mask, highest first.
pub const SAMPLE_RATES: [(u32, u32); 13] = [
    (0x0000_1000, 768000),
    (0x0000_0800, 705600),
    (0x0000_0400, 384000),
    (0x0000_0200, 352800),
    (0x0000_0100, 192000),
    (0x0000_0080, 176400),
    (0x0000_0040, 96000),
    (0x0000_0020, 88200),
    (0x0000_0010, 48000),
    (0x0000_0008, 44100),
    (0x0000_0004, 32000),
    (0x0000_0002, 22050),
    (0x0000_0001, 11025),
];

/// Mask with every standard rate set
pub const ALL_SAMPLE_RATES: u32 = 0x0000_1fff;

/// Base buffer sizes in frames at the 1x coefficient, largest first
pub const BUFFER_SIZES: [u32; 13] = [2048, 1536, 1024, 768, 512, 384, 256, 192, 128, 96, 64, 48, 32];

/// Extra small sizes offered only in diagnostic mode
pub const DIAGNOSTIC_BUFFER_SIZES: [u32; 5] = [24, 16, 12, 8, 4];

/// Decode a supported-rate mask into rates, highest to lowest.
/// Bits outside the 13-rate universe are ignored.
pub fn decode_sample_rates(supported: u32) -> Vec<u32> {
    SAMPLE_RATES
        .iter()
        .filter(|(bit, _)| supported & bit != 0)
        .map(|(_, rate)| *rate)
        .collect()
}

/// Mask bit for a standard rate, if it is one
pub fn sample_rate_bit(rate: u32) -> Option<u32> {
    SAMPLE_RATES.iter().find(|(_, r)| *r == rate).map(|(bit, _)| *bit)
}

/// Multiplier applied to the base buffer table for a given rate.
///
/// The tiers are open intervals, so rates sitting exactly on a tier edge
/// (50000, 99999, 100000, 199999, 200000, 399999, 400000) fall through to 1.
pub fn buffer_coefficient(sample_rate: u32) -> u32 {
    let mut coefficient = 1;
    if sample_rate > 50000 && sample_rate < 99999 {
        coefficient = 2;
    }
    if sample_rate > 100000 && sample_rate < 199999 {
        coefficient = 4;
    }
    if sample_rate > 200000 && sample_rate < 399999 {
        coefficient = 8;
    }
    if sample_rate > 400000 {
        coefficient = 16;
    }
    coefficient
}

/// Buffer-size choices for a coefficient, largest first.
pub fn buffer_sizes(coefficient: u32, diagnostic: bool) -> Vec<u32> {
    let extra: &[u32] = if diagnostic { &DIAGNOSTIC_BUFFER_SIZES } else { &[] };

    BUFFER_SIZES
        .iter()
        .chain(extra)
        .map(|size| size * coefficient)
        .collect()
}
