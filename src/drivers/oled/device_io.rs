use anyhow::{Context, Result};
use linux_embedded_hal::i2cdev::{core::I2CDevice, linux::LinuxI2CDevice};

/// Raw write access to the display controller.
pub trait DeviceIO: Send + 'static {
    fn write(&mut self, buf: &[u8]) -> Result<()>;
}

impl DeviceIO for LinuxI2CDevice {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        I2CDevice::write(self, buf).context("OLED I2C write failed")
    }
}
