//! Drawing surface used by the status screens.

use anyhow::Result;

/// Width of the Argon OLED in pixels.
pub const SCREEN_WIDTH: i32 = 128;
/// Height of the Argon OLED in pixels.
pub const SCREEN_HEIGHT: i32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    /// 8 px rows, used for lists.
    Small,
    /// 16 px rows, used for single large values.
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Static artwork drawn underneath a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Clock,
    Cpu,
    Storage,
    Raid,
    Ram,
    Temp,
    Ip,
}

/// A 1-bit display with a frame buffer.
///
/// Drawing calls only touch the buffer; nothing reaches the device until
/// [`Panel::flush`].
pub trait Panel: Send {
    fn width(&self) -> i32 {
        SCREEN_WIDTH
    }

    fn clear(&mut self);

    /// Clears the buffer and draws the artwork for a screen.
    fn load_background(&mut self, background: Background);

    fn write_text(&mut self, text: &str, x: i32, y: i32, font: Font);

    /// Writes text aligned inside the `width` pixels starting at `x`.
    fn write_text_aligned(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        width: i32,
        align: Align,
        font: Font,
    );

    fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32);

    fn flush(&mut self) -> Result<()>;

    fn set_power(&mut self, on: bool) -> Result<()>;
}
