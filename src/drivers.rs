//! Hardware behind the Argon ONE case: fan controller, power button and
//! status OLED.

pub mod gpio_button;
pub mod i2c_fan;
pub mod oled;

pub use gpio_button::GpioButton;
pub use i2c_fan::I2cFanBus;
pub use oled::OledPanel;
