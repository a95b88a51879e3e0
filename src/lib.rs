// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

//! Device agnostic driver for the MPU-6050 IMU (inertial measurement unit).
//! The driver depends on embedded-hal, so as long as the HAL you use implements those traits, then
//! this driver should be compatible.
//!
//! The data sheet for this device can be found [here](https://invensense.tdk.com/download-pdf/mpu-6000-datasheet/).
//!
//! The driver covers register configuration, scaled accelerometer/gyroscope/temperature
//! readings and the factory self-test procedure. Bus transport is left to the HAL: anything
//! implementing the `embedded-hal` 1.0 blocking I2C trait works.
//!
//! You can instantiate multiple objects if you have multiple IMUs. The driver assumes control of
//! the bus and thus it is recommended to use shared-bus. The driver performs no internal locking;
//! if several threads talk to the same device the caller must serialize access per device address.
//!
//! Currently, there is no support for the FIFO, interrupts, the FSYNC input, or the DMP.
//!
//! Enable the `defmt` feature to get `defmt::Format` implementations on the driver and its
//! error type.

#![deny(missing_docs)]
#![no_std]

/// Main module that holds the I2C driver along with the register map,
/// scale tables, codec helpers and error type.
pub mod mpu6050;
