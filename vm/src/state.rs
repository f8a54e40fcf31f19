use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_SET, FONT_START, KEY_COUNT, MEMORY_SIZE, PROGRAM_START,
    REGISTER_COUNT, STACK_LEVELS,
};
use crate::error::Error;

/// The FrameBuffer is indexed as [y][x]; rows are contiguous so it can be uploaded with `VIDEO_PITCH`
pub type FrameBuffer = [[u32; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

/// Pressed status of the keys 0..F, 1 while held
pub type Keypad = [u8; KEY_COUNT];

/// Whether the CPU is executing instructions or parked on an Fx0A
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Running,
    AwaitingKey { register: u8 },
}

/// The Chip8 internal state
///
/// ## CPU
/// Registers
/// - (v) 16 primary 8-bit registers (V0..VF)
///     - the first 15 (V0..VE) are general purpose registers
///     - the 16th (VF) is the carry, borrow and collision flag
/// - (i) a 16-bit memory address register
///
/// Counter
/// - (pc) a 16-bit program counter
///
/// Pointer
/// - (sp) an 8-bit stack pointer, the number of occupied stack slots
///
/// Timers
/// - 2 8-bit timers (delay & sound), decremented once per cycle while nonzero
///
/// ## Memory
/// - 16 level stack of return addresses
/// - 4096 bytes of addressable memory
///     - 0x050..0x0A0 holds the font set
///     - 0x200.. holds the loaded ROM
/// - 32x64 frame buffer
///
/// ## Input
/// - `keypad` is written by whoever owns the keyboard and only read by instructions
#[derive(Clone)]
pub struct State {
    pub v: [u8; REGISTER_COUNT],
    pub i: u16,
    pub pc: u16,
    pub sp: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub stack: [u16; STACK_LEVELS],
    pub memory: [u8; MEMORY_SIZE],
    pub frame_buffer: FrameBuffer,
    pub draw_flag: bool,
    pub keypad: Keypad,
    pub mode: Mode,
    rng: StdRng,
}

impl State {
    pub fn new(rng: StdRng) -> Self {
        let mut memory = [0; MEMORY_SIZE];
        let font = FONT_START as usize;
        memory[font..font + FONT_SET.len()].copy_from_slice(&FONT_SET);

        State {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_LEVELS],
            memory,
            frame_buffer: [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
            draw_flag: false,
            keypad: [0; KEY_COUNT],
            mode: Mode::Running,
            rng,
        }
    }

    /// A state whose random source always yields the same sequence
    pub fn with_seed(seed: u64) -> Self {
        State::new(StdRng::seed_from_u64(seed))
    }

    /// A uniformly distributed byte from this state's random source
    pub fn random_byte(&mut self) -> u8 {
        self.rng.gen()
    }

    /// The lowest numbered key currently held, if any
    pub fn pressed_key(&self) -> Option<u8> {
        self.keypad
            .iter()
            .position(|&key| key != 0)
            .map(|key| key as u8)
    }

    /// Borrow `len` bytes of memory starting at `address`
    pub fn memory_slice(&self, address: u16, len: usize) -> Result<&[u8], Error> {
        let start = address as usize;
        self.memory
            .get(start..start + len)
            .ok_or_else(|| Error::MemoryOutOfBounds {
                address: start + len.max(1) - 1,
            })
    }

    /// Mutably borrow `len` bytes of memory starting at `address`
    pub fn memory_slice_mut(&mut self, address: u16, len: usize) -> Result<&mut [u8], Error> {
        let start = address as usize;
        self.memory
            .get_mut(start..start + len)
            .ok_or_else(|| Error::MemoryOutOfBounds {
                address: start + len.max(1) - 1,
            })
    }
}
