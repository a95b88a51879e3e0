// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use crate::mpu6050::bits::{AccelConfig, Config, GyroConfig, PwrMgmt1};
use crate::mpu6050::{
    accel_factory_trim, accel_scale, accel_trim_code, combine_word, gyro_factory_trim, gyro_scale,
    sample_rate_divider, temperature_celsius, trim_deviation,
};
use crate::mpu6050::{
    AccelUnit, Axes, AxisTriple, MpuError, PowerManagement, Registers, SelfTestDeviation,
    TemperatureUnit,
};
use crate::mpu6050::{
    ACCEL_SELF_TEST, ACCEL_SEN_DEFAULT, GRAVITY_MS2, GYRO_SELF_TEST, GYRO_SEN_DEFAULT,
    GYRO_TRIM_MASK,
};
#[cfg(feature = "defmt")]
use defmt::{Format, Formatter};

use embedded_hal::i2c::I2c;

/// The MPU IMU struct is the base of the driver. Instantiate this struct in your application
/// code then use it to interact with the IMU.
///
/// The struct owns the per-sensor sensitivity divisors. They are mutated only by the
/// field-composition config calls; the raw register writes leave them untouched.
pub struct MpuImu<BUS> {
    bus: BUS,
    addr: u8,

    databuf: [u8; 2],

    accel_sen: f64,
    gyro_sen: f64,
}

impl<BUS, E> MpuImu<BUS>
where
    BUS: I2c<Error = E>,
{
    /// Create and initialize a new IMU driver.
    ///
    /// The I2C bus is given as `bus`. The 7-bit address is specified as `addr`;
    /// use [`ADDR_DEFAULT`](crate::mpu6050::ADDR_DEFAULT) unless the AD0 pin is high.
    ///
    /// Initialization wakes the device with the X-gyro PLL as clock source, sets
    /// 1000 samples per second with the DLPF enabled, and selects the 250 dps and
    /// 2g full-scale ranges.
    pub fn new(bus: BUS, addr: u8) -> Result<Self, MpuError<E>> {
        let mut imu = MpuImu {
            bus,
            addr,
            databuf: [0; 2],
            accel_sen: ACCEL_SEN_DEFAULT,
            gyro_sen: GYRO_SEN_DEFAULT,
        };

        imu.power_manage(PowerManagement {
            clock_source: 1,
            ..PowerManagement::default()
        })?;
        imu.set_sample_rate(1000.0)?;
        imu.configure(0, 1)?;
        imu.gyro_config(Axes::NONE, 250)?;
        imu.accel_config(Axes::NONE, 2)?;

        Ok(imu)
    }

    /// Who Am I? Reads the WHO_AM_I register and reports the value.
    ///
    /// Useful for testing that the IMU is properly connected. The device answers 0x68
    /// regardless of the AD0 pin.
    pub fn who_am_i(&mut self) -> Result<u8, MpuError<E>> {
        self.read_reg(Registers::WhoAmI.addr())
    }

    /// Sets the PWR_MGMT_1 register from its named fields.
    pub fn power_manage(&mut self, pm: PowerManagement) -> Result<(), MpuError<E>> {
        let mut reg = PwrMgmt1(0);
        reg.set_device_reset(pm.reset);
        reg.set_sleep(pm.sleep);
        reg.set_cycle(pm.cycle);
        reg.set_temp_dis(pm.temp_disable);
        reg.set_clksel(pm.clock_source);

        self.write_reg(Registers::PwrMgmt1, reg.0)
    }

    /// Writes a raw byte to the PWR_MGMT_1 register, bypassing field composition.
    pub fn power_manage_raw(&mut self, value: u8) -> Result<(), MpuError<E>> {
        self.write_reg(Registers::PwrMgmt1, value)
    }

    /// Resets the IMU.
    ///
    /// All registers return to their default values (PWR_MGMT_1 reads 0x40 afterwards,
    /// WHO_AM_I stays 0x68). Allow the device at least 10ms to settle before any further
    /// register access; the driver does not wait internally.
    pub fn reset(&mut self) -> Result<(), MpuError<E>> {
        self.power_manage(PowerManagement {
            reset: true,
            ..PowerManagement::default()
        })
    }

    /// Configures the sample rate in samples per second.
    ///
    /// `rate` must lie within 3.906..=8000 or the call fails with `SampleRateOutOfRange`
    /// and writes nothing. Rates above 1000 need the gyro output running at 8kHz, so the
    /// DLPF is disabled for those and enabled (setting 1) otherwise. The divider written
    /// to SMPRT_DIV is `round(output_rate / rate) - 1`; the realized rate therefore may
    /// differ slightly from the request.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<(), MpuError<E>> {
        let (dlpf, div) = sample_rate_divider(rate).ok_or(MpuError::SampleRateOutOfRange)?;

        self.configure(0, dlpf)?;
        self.write_reg(Registers::SmprtDiv, div)
    }

    /// Sets the CONFIG register: FSYNC sampling in `ext_sync` (3 bits) and the digital
    /// low pass filter in `dlpf` (3 bits).
    pub fn configure(&mut self, ext_sync: u8, dlpf: u8) -> Result<(), MpuError<E>> {
        let mut reg = Config(0);
        reg.set_ext_sync_set(ext_sync);
        reg.set_dlpf_cfg(dlpf);

        self.write_reg(Registers::Config, reg.0)
    }

    /// Writes a raw byte to the CONFIG register, bypassing field composition.
    pub fn configure_raw(&mut self, value: u8) -> Result<(), MpuError<E>> {
        self.write_reg(Registers::Config, value)
    }

    /// Configures the gyroscope: per-axis self-test triggers and the full-scale range
    /// in degrees per second (250, 500, 1000 or 2000).
    ///
    /// An unsupported range fails with `InvalidRange` before anything is written.
    /// On success the stored gyro sensitivity divisor is updated to 32768 / range.
    pub fn gyro_config(&mut self, self_test: Axes, range_dps: u16) -> Result<(), MpuError<E>> {
        let (fs_sel, divisor) = gyro_scale(range_dps).ok_or(MpuError::InvalidRange)?;

        let mut reg = GyroConfig(0);
        reg.set_xg_st(self_test.x);
        reg.set_yg_st(self_test.y);
        reg.set_zg_st(self_test.z);
        reg.set_fs_sel(fs_sel);

        self.write_reg(Registers::GyroConfig, reg.0)?;
        self.gyro_sen = divisor;

        Ok(())
    }

    /// Writes a raw byte to the GYRO_CONFIG register, bypassing field composition.
    /// The stored gyro sensitivity is left untouched.
    pub fn gyro_config_raw(&mut self, value: u8) -> Result<(), MpuError<E>> {
        self.write_reg(Registers::GyroConfig, value)
    }

    /// Configures the accelerometer: per-axis self-test triggers and the full-scale
    /// range in g (2, 4, 8 or 16).
    ///
    /// An unsupported range fails with `InvalidRange` before anything is written.
    /// On success the stored accel sensitivity divisor is updated to 32768 / range.
    pub fn accel_config(&mut self, self_test: Axes, range_g: u8) -> Result<(), MpuError<E>> {
        let (afs_sel, divisor) = accel_scale(range_g).ok_or(MpuError::InvalidRange)?;

        let mut reg = AccelConfig(0);
        reg.set_xa_st(self_test.x);
        reg.set_ya_st(self_test.y);
        reg.set_za_st(self_test.z);
        reg.set_afs_sel(afs_sel);

        self.write_reg(Registers::AccelConfig, reg.0)?;
        self.accel_sen = divisor;

        Ok(())
    }

    /// Writes a raw byte to the ACCEL_CONFIG register, bypassing field composition.
    /// The stored accel sensitivity is left untouched.
    pub fn accel_config_raw(&mut self, value: u8) -> Result<(), MpuError<E>> {
        self.write_reg(Registers::AccelConfig, value)
    }

    /// The accelerometer sensitivity divisor currently in effect, in LSB per g.
    pub fn accel_sensitivity(&self) -> f64 {
        self.accel_sen
    }

    /// The gyroscope sensitivity divisor currently in effect, in LSB per dps.
    pub fn gyro_sensitivity(&self) -> f64 {
        self.gyro_sen
    }

    /// Reads the temperature sensor.
    ///
    /// Celsius is `raw / 340 + 36.53` per the data sheet; Fahrenheit is converted
    /// from that.
    pub fn read_temperature(&mut self, unit: TemperatureUnit) -> Result<f64, MpuError<E>> {
        let raw = self.read_pair(Registers::TempOutH.addr())?;
        let celsius = temperature_celsius(raw);

        Ok(match unit {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        })
    }

    /// Reads the accelerometer axes selected in `axes` and scales them with the
    /// current sensitivity.
    ///
    /// Axes that are not selected are not read from the bus and report 0.0; treat
    /// that as "not requested", not as a measurement.
    pub fn read_accelerometer(
        &mut self,
        axes: Axes,
        unit: AccelUnit,
    ) -> Result<AxisTriple<f64>, MpuError<E>> {
        let base = Registers::AccelXOutH.addr();
        let mut out = AxisTriple {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };

        if axes.x {
            out.x = f64::from(self.read_pair(base)?) / self.accel_sen;
        }
        if axes.y {
            out.y = f64::from(self.read_pair(base + 2)?) / self.accel_sen;
        }
        if axes.z {
            out.z = f64::from(self.read_pair(base + 4)?) / self.accel_sen;
        }

        if unit == AccelUnit::MetersPerSecondSquared {
            out.x *= GRAVITY_MS2;
            out.y *= GRAVITY_MS2;
            out.z *= GRAVITY_MS2;
        }

        Ok(out)
    }

    /// Reads the gyroscope axes selected in `axes` and scales them with the current
    /// sensitivity. Results are in degrees per second.
    ///
    /// Axes that are not selected are not read from the bus and report 0.0.
    pub fn read_gyroscope(&mut self, axes: Axes) -> Result<AxisTriple<f64>, MpuError<E>> {
        let base = Registers::GyroXOutH.addr();
        let mut out = AxisTriple {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };

        if axes.x {
            out.x = f64::from(self.read_pair(base)?) / self.gyro_sen;
        }
        if axes.y {
            out.y = f64::from(self.read_pair(base + 2)?) / self.gyro_sen;
        }
        if axes.z {
            out.z = f64::from(self.read_pair(base + 4)?) / self.gyro_sen;
        }

        Ok(out)
    }

    /// Runs the factory self-test for the gyroscope and returns the normalized
    /// deviation per axis.
    ///
    /// Captures a baseline reading, writes the excitation byte 0xE0 (all three ST
    /// bits, 250 dps range select) to GYRO_CONFIG, reads again, and compares the
    /// response against the factory trim codes. The excitation byte is left in the
    /// register; call [`gyro_config`](Self::gyro_config) afterwards to restore a
    /// normal configuration. Do not interleave other configuration calls while the
    /// sequence runs.
    ///
    /// Note: the vendor formula inverts the sign of the Y axis factory trim
    /// relative to X and Z.
    pub fn self_test_gyroscope(&mut self) -> Result<AxisTriple<f64>, MpuError<E>> {
        let baseline = self.read_gyroscope(Axes::ALL)?;
        self.gyro_config_raw(GYRO_SELF_TEST)?;
        let excited = self.read_gyroscope(Axes::ALL)?;

        let x_code = self.read_reg(Registers::SelfTestX.addr())? & GYRO_TRIM_MASK;
        let y_code = self.read_reg(Registers::SelfTestY.addr())? & GYRO_TRIM_MASK;
        let z_code = self.read_reg(Registers::SelfTestZ.addr())? & GYRO_TRIM_MASK;

        Ok(AxisTriple {
            x: trim_deviation(excited.x, baseline.x, gyro_factory_trim(x_code))
                .ok_or(MpuError::DivisionByZero)?,
            y: trim_deviation(excited.y, baseline.y, -gyro_factory_trim(y_code))
                .ok_or(MpuError::DivisionByZero)?,
            z: trim_deviation(excited.z, baseline.z, gyro_factory_trim(z_code))
                .ok_or(MpuError::DivisionByZero)?,
        })
    }

    /// Runs the factory self-test for the accelerometer and returns the normalized
    /// deviation per axis.
    ///
    /// Same sequence as the gyro variant with excitation byte 0xF0 written to
    /// ACCEL_CONFIG, which is likewise left in the register afterwards. The 5-bit
    /// trim codes are reassembled from the split bitfields of the SELF_TEST_X/Y/Z
    /// and SELF_TEST_A registers.
    pub fn self_test_accelerometer(&mut self) -> Result<AxisTriple<f64>, MpuError<E>> {
        let baseline = self.read_accelerometer(Axes::ALL, AccelUnit::MetersPerSecondSquared)?;
        self.accel_config_raw(ACCEL_SELF_TEST)?;
        let excited = self.read_accelerometer(Axes::ALL, AccelUnit::MetersPerSecondSquared)?;

        let coarse_x = self.read_reg(Registers::SelfTestX.addr())?;
        let coarse_y = self.read_reg(Registers::SelfTestY.addr())?;
        let coarse_z = self.read_reg(Registers::SelfTestZ.addr())?;
        let fine = self.read_reg(Registers::SelfTestA.addr())?;

        let x_code = accel_trim_code(coarse_x, fine, 4);
        let y_code = accel_trim_code(coarse_y, fine, 2);
        let z_code = accel_trim_code(coarse_z, fine, 0);

        Ok(AxisTriple {
            x: trim_deviation(excited.x, baseline.x, accel_factory_trim(x_code))
                .ok_or(MpuError::DivisionByZero)?,
            y: trim_deviation(excited.y, baseline.y, accel_factory_trim(y_code))
                .ok_or(MpuError::DivisionByZero)?,
            z: trim_deviation(excited.z, baseline.z, accel_factory_trim(z_code))
                .ok_or(MpuError::DivisionByZero)?,
        })
    }

    /// Runs the factory self-test for both sensors, gyroscope first.
    ///
    /// Both config registers hold their excitation bytes afterwards; reconfigure
    /// with [`gyro_config`](Self::gyro_config) and [`accel_config`](Self::accel_config)
    /// before taking further measurements.
    pub fn self_test(&mut self) -> Result<SelfTestDeviation, MpuError<E>> {
        let gyro = self.self_test_gyroscope()?;
        let accel = self.self_test_accelerometer()?;

        Ok(SelfTestDeviation { gyro, accel })
    }

    fn write_reg(&mut self, reg: Registers, value: u8) -> Result<(), MpuError<E>> {
        self.databuf[0] = reg.addr();
        self.databuf[1] = value;
        self.bus.write(self.addr, &self.databuf[0..2])?;

        Ok(())
    }

    fn read_reg(&mut self, reg_addr: u8) -> Result<u8, MpuError<E>> {
        let mut buf = [0];
        self.bus.write_read(self.addr, &[reg_addr], &mut buf)?;

        Ok(buf[0])
    }

    // Reads the big-endian register pair at reg_addr / reg_addr + 1.
    fn read_pair(&mut self, reg_addr: u8) -> Result<i16, MpuError<E>> {
        let high = self.read_reg(reg_addr)?;
        let low = self.read_reg(reg_addr + 1)?;

        Ok(combine_word(high, low))
    }
}

#[cfg(feature = "defmt")]
impl<BUS> Format for MpuImu<BUS> {
    fn format(&self, fmt: Formatter) {
        defmt::write!(fmt, "MPU-6050 IMU")
    }
}
