/// Display dimensions in pixels
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Value of a lit pixel; unlit pixels are 0
pub const PIXEL_ON: u32 = 0xFFFF_FFFF;

/// Byte stride of a single FrameBuffer row, for renderers that upload it as a texture
pub const VIDEO_PITCH: usize = DISPLAY_WIDTH * std::mem::size_of::<u32>();

pub const MEMORY_SIZE: usize = 4096;
pub const REGISTER_COUNT: usize = 16;
pub const STACK_LEVELS: usize = 16;
pub const KEY_COUNT: usize = 16;

/// 0x200 is where ROMs are loaded into memory
pub const PROGRAM_START: u16 = 0x200;

/// The largest ROM that fits between PROGRAM_START and the end of memory
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

/// Where the font sprites live, inside the region reserved for the interpreter
pub const FONT_START: u16 = 0x50;

/// Each font sprite is 4 pixels wide and 5 rows tall
pub const FONT_SPRITE_SIZE: u16 = 5;

/// # Font set
/// Sprites for the hexadecimal digits 0..F.
///
/// Each row is a byte whose high nibble holds the pixels, e.g. the sprite for `0`:
/// ```text
/// 0xF0  ****
/// 0x90  *  *
/// 0x90  *  *
/// 0x90  *  *
/// 0xF0  ****
/// ```
pub const FONT_SET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
