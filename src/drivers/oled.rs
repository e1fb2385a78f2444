//! SSD1306 OLED of the Argon ONE case, drawn with embedded-graphics.

pub mod device_io;
pub mod frame;
pub mod protocol;

use anyhow::{Context, Result};
use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle, iso_8859_1::FONT_5X8, iso_8859_1::FONT_8X13},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use linux_embedded_hal::i2cdev::linux::LinuxI2CDevice;
use log::{debug, info};

use crate::display::{Align, Background, Font, Panel};

use device_io::DeviceIO;
use frame::FrameBuffer;
use protocol::{Command, INIT_SEQUENCE, data_packets};

/// I2C address of the OLED controller.
pub const OLED_ADDRESS: u16 = 0x3c;

fn font(font: Font) -> &'static MonoFont<'static> {
    match font {
        Font::Small => &FONT_5X8,
        Font::Regular => &FONT_8X13,
    }
}

/// Caption standing in for the artwork of each screen, with its position.
fn caption(background: Background) -> (&'static str, i32, i32, i32) {
    // (text, x, y, width)
    match background {
        Background::Clock => ("TIME", 0, 28, 54),
        Background::Cpu => ("CPU", 0, 28, 54),
        Background::Raid => ("RAID", 0, 28, 54),
        Background::Ram => ("RAM", 0, 28, 54),
        Background::Temp => ("TEMP", 0, 48, 54),
        Background::Storage => ("STORAGE", 0, 0, 128),
        Background::Ip => ("IP ADDRESS", 0, 48, 128),
    }
}

pub struct OledPanel<Io: DeviceIO> {
    dev: Io,
    frame: FrameBuffer,
    powered: bool,
}

impl<Io: DeviceIO> std::fmt::Debug for OledPanel<Io> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OledPanel").field("powered", &self.powered).finish()
    }
}

impl OledPanel<LinuxI2CDevice> {
    /// Opens the panel on `/dev/i2c-<bus>` and runs the power-up sequence.
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let path = format!("/dev/i2c-{bus}");
        let dev = LinuxI2CDevice::new(&path, address)
            .with_context(|| format!("Failed to open OLED at {path} 0x{address:02x}"))?;
        let panel = Self::init(dev).context("OLED did not respond")?;
        info!("OLED ready on {path} at 0x{address:02x}");
        Ok(panel)
    }
}

impl<Io: DeviceIO> OledPanel<Io> {
    pub fn init(mut dev: Io) -> Result<Self> {
        for command in INIT_SEQUENCE {
            dev.write(&command.to_bytes())?;
        }
        let mut panel = Self {
            dev,
            frame: FrameBuffer::default(),
            powered: true,
        };
        panel.flush()?;
        Ok(panel)
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    fn draw<D>(&mut self, item: &D)
    where
        D: Drawable<Color = BinaryColor>,
    {
        if let Err(never) = item.draw(&mut self.frame) {
            match never {}
        }
    }
}

impl<Io: DeviceIO> Panel for OledPanel<Io> {
    fn clear(&mut self) {
        self.frame.clear();
    }

    fn load_background(&mut self, background: Background) {
        self.frame.clear();
        let (text, x, y, width) = caption(background);
        self.write_text_aligned(text, x, y, width, Align::Center, Font::Small);
    }

    fn write_text(&mut self, text: &str, x: i32, y: i32, font: Font) {
        self.write_text_aligned(text, x, y, 0, Align::Left, font);
    }

    fn write_text_aligned(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        width: i32,
        align: Align,
        font: Font,
    ) {
        let style = MonoTextStyle::new(self::font(font), BinaryColor::On);
        let (anchor, alignment) = match align {
            Align::Left => (x, Alignment::Left),
            Align::Center => (x + width / 2, Alignment::Center),
            Align::Right => (x + width, Alignment::Right),
        };
        let text_style = TextStyleBuilder::new()
            .alignment(alignment)
            .baseline(Baseline::Top)
            .build();
        self.draw(&Text::with_text_style(text, Point::new(anchor, y), style, text_style));
    }

    fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            return;
        };
        self.draw(
            &Rectangle::new(Point::new(x, y), Size::new(width, height))
                .into_styled(PrimitiveStyle::with_fill(BinaryColor::On)),
        );
    }

    fn flush(&mut self) -> Result<()> {
        let last_column = (frame::WIDTH - 1) as u8;
        let last_page = (frame::HEIGHT / 8 - 1) as u8;
        self.dev.write(&Command::ColumnRange(0, last_column).to_bytes())?;
        self.dev.write(&Command::PageRange(0, last_page).to_bytes())?;
        for packet in data_packets(self.frame.as_bytes()) {
            self.dev.write(&packet)?;
        }
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<()> {
        if self.powered == on {
            return Ok(());
        }
        debug!("OLED power {}", if on { "on" } else { "off" });
        self.dev.write(&Command::DisplayOn(on).to_bytes())?;
        self.powered = on;
        Ok(())
    }
}
