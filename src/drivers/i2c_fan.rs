use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use linux_embedded_hal::i2cdev::{core::I2CDevice, linux::LinuxI2CDevice};
use log::info;

use crate::fan_driver::FanBus;

/// I2C address of the case's fan microcontroller.
pub const FAN_ADDRESS: u16 = 0x1a;

/// Bus used when none is configured: `/dev/i2c-1` on every board revision
/// that exposes it, `/dev/i2c-0` on the earliest ones.
pub fn default_bus() -> u8 {
    if Path::new("/dev/i2c-1").exists() { 1 } else { 0 }
}

pub fn bus_path(bus: u8) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{bus}"))
}

/// Fan controller reached through Linux i2c-dev.
pub struct I2cFanBus {
    device: LinuxI2CDevice,
    path: PathBuf,
}

impl std::fmt::Debug for I2cFanBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cFanBus").field("path", &self.path).finish()
    }
}

impl I2cFanBus {
    pub fn open(bus: Option<u8>, address: u16) -> Result<Self> {
        let path = bus_path(bus.unwrap_or_else(default_bus));
        let device = LinuxI2CDevice::new(&path, address).with_context(|| {
            format!("Failed to open fan controller at {} 0x{address:02x}", path.display())
        })?;
        info!("Fan controller on {} at 0x{address:02x}", path.display());
        Ok(Self { device, path })
    }
}

#[async_trait]
impl FanBus for I2cFanBus {
    async fn write_byte(&mut self, value: u8) -> Result<()> {
        self.device
            .smbus_write_byte(value)
            .with_context(|| format!("I2C write of {value} to {} failed", self.path.display()))
    }
}
