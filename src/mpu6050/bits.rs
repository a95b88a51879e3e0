// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use bitfield::bitfield;

bitfield! {
    /// bitfields of the PWR_MGMT_1 register
    pub struct PwrMgmt1(u8);
    impl Debug;
    /// reset all internal registers to their default values
    pub device_reset, set_device_reset: 7;
    /// put the device into sleep mode
    pub sleep, set_sleep: 6;
    /// cycle between sleep mode and waking up to take a single sample
    pub cycle, set_cycle: 5;
    /// disable the temperature sensor
    pub temp_dis, set_temp_dis: 3;
    /// clock source selection
    pub u8, clksel, set_clksel: 2, 0;
}

bitfield! {
    /// bitfields of the CONFIG register
    pub struct Config(u8);
    impl Debug;
    /// FSYNC pin sampling configuration
    pub u8, ext_sync_set, set_ext_sync_set: 5, 3;
    /// digital low pass filter configuration
    pub u8, dlpf_cfg, set_dlpf_cfg: 2, 0;
}

bitfield! {
    /// bitfields of the GYRO_CONFIG register
    pub struct GyroConfig(u8);
    impl Debug;
    /// X axis gyroscope self-test trigger
    pub xg_st, set_xg_st: 7;
    /// Y axis gyroscope self-test trigger
    pub yg_st, set_yg_st: 6;
    /// Z axis gyroscope self-test trigger
    pub zg_st, set_zg_st: 5;
    /// full scale range selector
    pub u8, fs_sel, set_fs_sel: 4, 3;
}

bitfield! {
    /// bitfields of the ACCEL_CONFIG register
    pub struct AccelConfig(u8);
    impl Debug;
    /// X axis accelerometer self-test trigger
    pub xa_st, set_xa_st: 7;
    /// Y axis accelerometer self-test trigger
    pub ya_st, set_ya_st: 6;
    /// Z axis accelerometer self-test trigger
    pub za_st, set_za_st: 5;
    /// full scale range selector
    pub u8, afs_sel, set_afs_sel: 4, 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwr_mgmt_fields_land_in_place() {
        let mut reg = PwrMgmt1(0);
        reg.set_device_reset(true);
        assert_eq!(reg.0, 0x80);

        let mut reg = PwrMgmt1(0);
        reg.set_sleep(true);
        reg.set_cycle(true);
        reg.set_temp_dis(true);
        assert_eq!(reg.0, 0x68);

        let mut reg = PwrMgmt1(0);
        reg.set_clksel(1);
        assert_eq!(reg.0, 0x01);
    }

    #[test]
    fn config_packs_ext_sync_and_dlpf() {
        let mut reg = Config(0);
        reg.set_ext_sync_set(1);
        reg.set_dlpf_cfg(1);
        assert_eq!(reg.0, 0x09);

        let mut reg = Config(0);
        reg.set_dlpf_cfg(6);
        assert_eq!(reg.0, 0x06);
    }

    #[test]
    fn gyro_config_packs_st_bits_and_range() {
        let mut reg = GyroConfig(0);
        reg.set_xg_st(true);
        reg.set_yg_st(true);
        reg.set_zg_st(true);
        assert_eq!(reg.0, 0xE0);

        let mut reg = GyroConfig(0);
        reg.set_fs_sel(3);
        assert_eq!(reg.0, 0x18);
    }

    #[test]
    fn accel_config_packs_st_bits_and_range() {
        let mut reg = AccelConfig(0);
        reg.set_xa_st(true);
        reg.set_ya_st(true);
        reg.set_za_st(true);
        reg.set_afs_sel(2);
        assert_eq!(reg.0, 0xF0);
        assert_eq!(AccelConfig(0xF0).afs_sel(), 2);
    }
}
