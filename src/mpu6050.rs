// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

/// The i2c module holds the driver implementation when using an I2C bus to communicate with the device
pub mod i2c;

pub(crate) mod bits;

#[cfg(feature = "defmt")]
use defmt::{Format, Formatter};

/// 7-bit bus address of the device when the AD0 pin is low (default condition).
pub const ADDR_DEFAULT: u8 = 0x68;
/// 7-bit bus address of the device when the AD0 pin is high.
pub const ADDR_AD0_HIGH: u8 = 0x69;

/// Standard gravity used to convert g readings to m/s^2.
pub const GRAVITY_MS2: f64 = 9.80665;

// Full scale register span of a 16-bit sample, LSB counts.
const FULL_SCALE_COUNTS: f64 = 32768.0;

// Temperature transfer function, data sheet section 4.18.
const TEMP_SENSITIVITY: f64 = 340.0;
const TEMP_OFFSET: f64 = 36.53;

// Supported sample rate window in samples per second.
const SAMPLE_RATE_MIN: f64 = 3.906;
const SAMPLE_RATE_MAX: f64 = 8000.0;

// Gyro output rate feeding the sample rate divider: 8kHz with the DLPF
// disabled, 1kHz with it enabled.
const OUTPUT_RATE_DLPF_OFF: f64 = 8000.0;
const OUTPUT_RATE_DLPF_ON: f64 = 1000.0;

// Self-test excitation bytes: all three ST bits set, plus bit 4 on the
// accelerometer side. Written verbatim through the raw config path.
pub(crate) const GYRO_SELF_TEST: u8 = 0xE0;
pub(crate) const ACCEL_SELF_TEST: u8 = 0xF0;

pub(crate) const GYRO_TRIM_MASK: u8 = 0x1F;

// Sensitivity state before the constructor applies the default ranges.
pub(crate) const ACCEL_SEN_DEFAULT: f64 = FULL_SCALE_COUNTS / 2.0;
pub(crate) const GYRO_SEN_DEFAULT: f64 = FULL_SCALE_COUNTS / 250.0;

/// Selection of device axes, used both as a read mask and as the set of
/// axes put into self-test by the config calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axes {
    /// X axis
    pub x: bool,
    /// Y axis
    pub y: bool,
    /// Z axis
    pub z: bool,
}

impl Axes {
    /// All three axes selected.
    pub const ALL: Axes = Axes {
        x: true,
        y: true,
        z: true,
    };
    /// No axis selected.
    pub const NONE: Axes = Axes {
        x: false,
        y: false,
        z: false,
    };
}

impl Default for Axes {
    fn default() -> Self {
        Axes::ALL
    }
}

/// A per-axis triple of values. Axes are independent of each other.
///
/// Axes that were not requested in a read are reported as the default
/// value of `T`, not omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTriple<T> {
    /// X axis value
    pub x: T,
    /// Y axis value
    pub y: T,
    /// Z axis value
    pub z: T,
}

/// Normalized self-test deviations for both sensor types.
///
/// No pass/fail threshold is applied by the driver; that policy belongs
/// to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfTestDeviation {
    /// Gyroscope deviation per axis
    pub gyro: AxisTriple<f64>,
    /// Accelerometer deviation per axis
    pub accel: AxisTriple<f64>,
}

/// Field settings for the PWR_MGMT_1 register.
///
/// The default value leaves every flag clear and selects the internal
/// oscillator as clock source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PowerManagement {
    /// Reset all internal registers to their default values
    pub reset: bool,
    /// Put the device into sleep mode
    pub sleep: bool,
    /// Cycle between sleep mode and waking up to take a single sample
    pub cycle: bool,
    /// Disable the temperature sensor
    pub temp_disable: bool,
    /// Clock source selection, 3-bit value. 1 selects the PLL with the
    /// X axis gyroscope as reference.
    pub clock_source: u8,
}

/// Unit of a temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    /// Degrees Celsius
    Celsius,
    /// Degrees Fahrenheit
    Fahrenheit,
}

/// Unit of an accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelUnit {
    /// Multiples of standard gravity
    Gravity,
    /// Meters per second squared
    MetersPerSecondSquared,
}

/// The possible errors that the driver can return.
///
/// The `BusError` option is for when a HAL function using the I2C bus fails.
/// This may be caused by a number of reasons. For example, using the wrong 7-bit address
/// with the I2C bus will cause a bus error.
///
/// The remaining options reject invalid inputs before any register write, or guard the
/// self-test arithmetic. No variant is retried internally.
#[derive(Debug, PartialEq, Eq)]
pub enum MpuError<E> {
    /// An error occurred when using the bus
    BusError(E),
    /// The requested full-scale range is not one the device supports
    InvalidRange,
    /// The requested sample rate is outside 3.906..=8000 samples per second
    SampleRateOutOfRange,
    /// A factory trim value of zero makes the self-test deviation undefined
    DivisionByZero,
}

impl<E> From<E> for MpuError<E> {
    fn from(error: E) -> Self {
        MpuError::BusError(error)
    }
}

#[cfg(feature = "defmt")]
impl<E> Format for MpuError<E> {
    fn format(&self, fmt: Formatter) {
        match *self {
            MpuError::BusError(_) => defmt::write!(fmt, "Bus Error!"),
            MpuError::InvalidRange => defmt::write!(fmt, "Unsupported full-scale range!"),
            MpuError::SampleRateOutOfRange => defmt::write!(fmt, "Sample rate out of range!"),
            MpuError::DivisionByZero => defmt::write!(fmt, "Factory trim value is zero!"),
        }
    }
}

pub(crate) enum Registers {
    PwrMgmt1,
    SmprtDiv,
    Config,
    GyroConfig,
    AccelConfig,
    TempOutH,
    AccelXOutH,
    GyroXOutH,
    SelfTestX,
    SelfTestY,
    SelfTestZ,
    SelfTestA,
    WhoAmI,
}

impl Registers {
    pub(crate) fn addr(&self) -> u8 {
        match *self {
            Registers::PwrMgmt1 => 0x6B,
            Registers::SmprtDiv => 0x19,
            Registers::Config => 0x1A,
            Registers::GyroConfig => 0x1B,
            Registers::AccelConfig => 0x1C,
            Registers::TempOutH => 0x41,
            Registers::AccelXOutH => 0x3B,
            Registers::GyroXOutH => 0x43,
            Registers::SelfTestX => 0x0D,
            Registers::SelfTestY => 0x0E,
            Registers::SelfTestZ => 0x0F,
            Registers::SelfTestA => 0x10,
            Registers::WhoAmI => 0x75,
        }
    }
}

/// Combines a high/low register pair into a signed 16-bit sample.
///
/// The device stores every 16-bit quantity big-endian across two adjacent
/// registers, two's complement.
pub fn combine_word(high: u8, low: u8) -> i16 {
    i16::from_be_bytes([high, low])
}

/// Looks up the FS_SEL selector code and LSB-per-dps divisor for a gyroscope
/// full-scale range given in degrees per second.
///
/// Only 250, 500, 1000 and 2000 dps exist on the device; anything else
/// returns `None`. The divisor is derived algebraically (32768 / range) so a
/// new range only ever needs a new table entry.
pub fn gyro_scale(range_dps: u16) -> Option<(u8, f64)> {
    let fs_sel = match range_dps {
        250 => 0,
        500 => 1,
        1000 => 2,
        2000 => 3,
        _ => return None,
    };
    Some((fs_sel, FULL_SCALE_COUNTS / f64::from(range_dps)))
}

/// Looks up the AFS_SEL selector code and LSB-per-g divisor for an
/// accelerometer full-scale range given in g.
///
/// Only 2, 4, 8 and 16 g exist on the device; anything else returns `None`.
pub fn accel_scale(range_g: u8) -> Option<(u8, f64)> {
    let afs_sel = match range_g {
        2 => 0,
        4 => 1,
        8 => 2,
        16 => 3,
        _ => return None,
    };
    Some((afs_sel, FULL_SCALE_COUNTS / f64::from(range_g)))
}

/// Factory trim response expected from a gyroscope axis for a given 5-bit
/// trim code, in LSB. Vendor formula `25 * 131 * 1.046^(code - 1)`.
pub fn gyro_factory_trim(code: u8) -> f64 {
    25.0 * 131.0 * libm::pow(1.046, f64::from(code) - 1.0)
}

/// Factory trim response expected from an accelerometer axis for a given
/// 5-bit trim code, in LSB. Vendor formula
/// `(4096 * 0.34 * 0.92^((code - 1) / 30)) / 0.34`.
pub fn accel_factory_trim(code: u8) -> f64 {
    (4096.0 * 0.34 * libm::pow(0.92, (f64::from(code) - 1.0) / 30.0)) / 0.34
}

// Accelerometer trim codes are split across two registers: the top three
// bits live in SELF_TEST_X/Y/Z and the bottom two in SELF_TEST_A, at a
// different position per axis (shift 4/2/0 for X/Y/Z).
pub(crate) fn accel_trim_code(coarse: u8, fine: u8, shift: u8) -> u8 {
    ((coarse & 0xE0) >> 3) | ((fine >> shift) & 0x03)
}

// Normalized deviation of the measured self-test response against the
// factory trim. None when the trim is zero and the quotient is undefined.
pub(crate) fn trim_deviation(excited: f64, baseline: f64, factory_trim: f64) -> Option<f64> {
    if factory_trim == 0.0 {
        return None;
    }
    Some((excited - baseline - factory_trim) / factory_trim)
}

pub(crate) fn temperature_celsius(raw: i16) -> f64 {
    f64::from(raw) / TEMP_SENSITIVITY + TEMP_OFFSET
}

// Validates a requested sample rate and resolves it to the DLPF_CFG value
// and divider byte to write. Rates above 1kHz need the DLPF off so the
// gyro output runs at 8kHz; the divider is then round(output / rate) - 1,
// half away from zero.
pub(crate) fn sample_rate_divider(rate: f64) -> Option<(u8, u8)> {
    if !(SAMPLE_RATE_MIN..=SAMPLE_RATE_MAX).contains(&rate) {
        return None;
    }

    let (dlpf, output_rate) = if rate > OUTPUT_RATE_DLPF_ON {
        (0, OUTPUT_RATE_DLPF_OFF)
    } else {
        (1, OUTPUT_RATE_DLPF_ON)
    };

    let div = libm::round(output_rate / rate) - 1.0;
    Some((dlpf, div as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_word_spans_the_signed_range() {
        assert_eq!(combine_word(0x7F, 0xFF), 32767);
        assert_eq!(combine_word(0x80, 0x00), -32768);
        assert_eq!(combine_word(0x00, 0x00), 0);
        assert_eq!(combine_word(0xFF, 0xFF), -1);
    }

    #[test]
    fn combine_word_round_trips() {
        for raw in [-32768, -16384, -340, -1, 0, 1, 340, 8192, 32767] {
            let bytes = (raw as i16).to_be_bytes();
            assert_eq!(combine_word(bytes[0], bytes[1]), raw as i16);
        }
    }

    #[test]
    fn gyro_scale_covers_the_four_ranges() {
        assert_eq!(gyro_scale(250), Some((0, 32768.0 / 250.0)));
        assert_eq!(gyro_scale(500), Some((1, 32768.0 / 500.0)));
        assert_eq!(gyro_scale(1000), Some((2, 32768.0 / 1000.0)));
        assert_eq!(gyro_scale(2000), Some((3, 32768.0 / 2000.0)));
    }

    #[test]
    fn gyro_scale_rejects_unsupported_ranges() {
        assert_eq!(gyro_scale(300), None);
        assert_eq!(gyro_scale(0), None);
        assert_eq!(gyro_scale(4000), None);
    }

    #[test]
    fn accel_scale_covers_the_four_ranges() {
        assert_eq!(accel_scale(2), Some((0, 16384.0)));
        assert_eq!(accel_scale(4), Some((1, 8192.0)));
        assert_eq!(accel_scale(8), Some((2, 4096.0)));
        assert_eq!(accel_scale(16), Some((3, 2048.0)));
    }

    #[test]
    fn accel_scale_rejects_unsupported_ranges() {
        assert_eq!(accel_scale(3), None);
        assert_eq!(accel_scale(0), None);
        assert_eq!(accel_scale(32), None);
    }

    #[test]
    fn gyro_factory_trim_anchors() {
        // code 1 makes the exponent zero: 25 * 131 exactly.
        assert!((gyro_factory_trim(1) - 3275.0).abs() < 1e-9);
        assert!((gyro_factory_trim(2) - 3275.0 * 1.046).abs() < 1e-9);
    }

    #[test]
    fn accel_factory_trim_anchors() {
        // code 1: the 0.34 factors cancel, leaving 4096.
        assert!((accel_factory_trim(1) - 4096.0).abs() < 1e-9);
        // code 31: exponent is exactly one.
        assert!((accel_factory_trim(31) - 4096.0 * 0.92).abs() < 1e-9);
    }

    #[test]
    fn accel_trim_code_reassembles_split_bitfields() {
        assert_eq!(accel_trim_code(0xE0, 0x3F, 4), 31);
        assert_eq!(accel_trim_code(0x20, 0x00, 4), 4);
        assert_eq!(accel_trim_code(0x00, 0x30, 4), 3);
        assert_eq!(accel_trim_code(0x00, 0x0C, 2), 3);
        assert_eq!(accel_trim_code(0x00, 0x03, 0), 3);
        // Low bits outside the axis lane are ignored.
        assert_eq!(accel_trim_code(0x1F, 0xC0, 4), 0);
    }

    #[test]
    fn trim_deviation_guards_zero_denominator() {
        assert_eq!(trim_deviation(1.0, 0.0, 0.0), None);
        assert_eq!(trim_deviation(0.0, 0.0, 3275.0), Some(-1.0));
        let dev = trim_deviation(400.0, 100.0, 250.0).unwrap();
        assert!((dev - 0.2).abs() < 1e-9);
    }

    #[test]
    fn temperature_formula_matches_data_sheet_points() {
        assert!((temperature_celsius(0) - 36.53).abs() < 1e-9);
        assert!((temperature_celsius(340) - 37.53).abs() < 1e-9);
        assert!((temperature_celsius(-340) - 35.53).abs() < 1e-9);
    }

    #[test]
    fn sample_rate_divider_resolves_dlpf_and_divider() {
        assert_eq!(sample_rate_divider(1000.0), Some((1, 0)));
        assert_eq!(sample_rate_divider(2000.0), Some((0, 3)));
        assert_eq!(sample_rate_divider(8000.0), Some((0, 0)));
        assert_eq!(sample_rate_divider(4000.0), Some((0, 1)));
        // Slowest supported rate still fits the 8-bit divider.
        assert_eq!(sample_rate_divider(3.906), Some((1, 255)));
    }

    #[test]
    fn sample_rate_divider_rejects_out_of_window_rates() {
        assert_eq!(sample_rate_divider(3.9), None);
        assert_eq!(sample_rate_divider(8000.1), None);
        assert_eq!(sample_rate_divider(0.0), None);
        assert_eq!(sample_rate_divider(-100.0), None);
    }
}
