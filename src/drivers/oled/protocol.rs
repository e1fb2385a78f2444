//! SSD1306 command set, as far as the Argon OLED needs it.

/// Control byte announcing a command stream.
pub const COMMAND_PREFIX: u8 = 0x00;
/// Control byte announcing display RAM data.
pub const DATA_PREFIX: u8 = 0x40;
/// Display RAM bytes sent per I2C transaction.
pub const DATA_CHUNK: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    DisplayOn(bool),
    ClockDivide(u8),
    Multiplex(u8),
    DisplayOffset(u8),
    StartLine(u8),
    ChargePump(bool),
    HorizontalAddressing,
    SegmentRemap,
    ComScanReversed,
    ComPins(u8),
    Contrast(u8),
    Precharge(u8),
    VcomDeselect(u8),
    FollowRam,
    NormalColors,
    ColumnRange(u8, u8),
    PageRange(u8, u8),
}

impl Command {
    pub fn to_bytes(self) -> Vec<u8> {
        let body: Vec<u8> = match self {
            Command::DisplayOn(on) => vec![if on { 0xAF } else { 0xAE }],
            Command::ClockDivide(v) => vec![0xD5, v],
            Command::Multiplex(v) => vec![0xA8, v],
            Command::DisplayOffset(v) => vec![0xD3, v],
            Command::StartLine(line) => vec![0x40 | (line & 0x3F)],
            Command::ChargePump(on) => vec![0x8D, if on { 0x14 } else { 0x10 }],
            Command::HorizontalAddressing => vec![0x20, 0x00],
            Command::SegmentRemap => vec![0xA1],
            Command::ComScanReversed => vec![0xC8],
            Command::ComPins(v) => vec![0xDA, v],
            Command::Contrast(v) => vec![0x81, v],
            Command::Precharge(v) => vec![0xD9, v],
            Command::VcomDeselect(v) => vec![0xDB, v],
            Command::FollowRam => vec![0xA4],
            Command::NormalColors => vec![0xA6],
            Command::ColumnRange(start, end) => vec![0x21, start, end],
            Command::PageRange(start, end) => vec![0x22, start, end],
        };
        let mut buf = Vec::with_capacity(body.len() + 1);
        buf.push(COMMAND_PREFIX);
        buf.extend(body);
        buf
    }
}

/// Power-up sequence for a 128x64 panel with internal charge pump.
pub const INIT_SEQUENCE: [Command; 16] = [
    Command::DisplayOn(false),
    Command::ClockDivide(0x80),
    Command::Multiplex(0x3F),
    Command::DisplayOffset(0),
    Command::StartLine(0),
    Command::ChargePump(true),
    Command::HorizontalAddressing,
    Command::SegmentRemap,
    Command::ComScanReversed,
    Command::ComPins(0x12),
    Command::Contrast(0xCF),
    Command::Precharge(0xF1),
    Command::VcomDeselect(0x40),
    Command::FollowRam,
    Command::NormalColors,
    Command::DisplayOn(true),
];

/// Splits display RAM into data transactions.
pub fn data_packets(ram: &[u8]) -> impl Iterator<Item = Vec<u8>> + '_ {
    ram.chunks(DATA_CHUNK).map(|chunk| {
        let mut buf = Vec::with_capacity(chunk.len() + 1);
        buf.push(DATA_PREFIX);
        buf.extend_from_slice(chunk);
        buf
    })
}
