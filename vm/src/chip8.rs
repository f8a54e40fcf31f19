use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::constants::{MAX_ROM_SIZE, PROGRAM_START};
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::state::{FrameBuffer, Keypad, Mode, State};

/// # Chip-8
/// Chip-8 is a virtual machine and corresponding interpreted language.
///
/// Tracks:
///  - current `state`
///  - the `dispatcher` that maps opcodes to operations
///
/// Supplies interfaces for:
/// - loading roms
/// - pressing and releasing keys
/// - advancing the CPU and its timers one cycle at a time
/// - inspecting its frame buffer for rendering by some display
///
/// It doesn't pace itself; whoever owns it decides how often to call `cycle`.
pub struct Chip8 {
    state: State,
    dispatcher: Dispatcher,
}

impl Chip8 {
    pub fn new() -> Self {
        Chip8::from_state(State::new(StdRng::from_entropy()))
    }

    /// A Chip-8 whose random numbers are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Chip8::from_state(State::with_seed(seed))
    }

    fn from_state(state: State) -> Self {
        Chip8 {
            state,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Load a rom from a source
    ///
    /// The whole rom is read before memory is touched, so a failed load leaves memory as it was.
    ///
    /// # Arguments
    /// * `reader` a reader that yields a raw ROM image
    pub fn load_rom(&mut self, reader: &mut dyn Read) -> Result<(), Error> {
        let mut rom = Vec::new();
        reader.read_to_end(&mut rom)?;
        if rom.len() > MAX_ROM_SIZE {
            return Err(Error::RomTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            });
        }

        let start = PROGRAM_START as usize;
        self.state.memory[start..start + rom.len()].copy_from_slice(&rom);
        debug!("loaded {} byte ROM at {:#05X}", rom.len(), start);
        Ok(())
    }

    /// Load a rom from a file on disk
    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let file = File::open(path)?;
        self.load_rom(&mut BufReader::new(file))
    }

    /// Returns the FrameBuffer if the display should be redrawn, and resets the draw flag
    pub fn get_frame(&mut self) -> Option<&FrameBuffer> {
        if std::mem::replace(&mut self.state.draw_flag, false) {
            Some(&self.state.frame_buffer)
        } else {
            None
        }
    }

    /// The current FrameBuffer, whether or not it changed
    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.state.frame_buffer
    }

    /// Set the pressed status of key
    ///
    /// # Arguments
    /// * `key` the 8-bit representation of the key that was pressed
    pub fn key_press(&mut self, key: u8) {
        if let Some(k) = self.state.keypad.get_mut(key as usize) {
            *k = 0x1;
        }
    }

    /// Unset the pressed status of key
    ///
    /// # Arguments
    /// * `key` the 8-bit representation of the key that was released
    pub fn key_release(&mut self, key: u8) {
        if let Some(k) = self.state.keypad.get_mut(key as usize) {
            *k = 0x0;
        }
    }

    /// The keypad, for input handlers that track all keys at once
    pub fn keypad_mut(&mut self) -> &mut Keypad {
        &mut self.state.keypad
    }

    /// Whether a tone should be playing
    pub fn sound_active(&self) -> bool {
        self.state.sound_timer > 0
    }

    /// A read-only view of registers, memory and timers
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Advances the CPU and timers by a single cycle
    /// - while awaiting a keypress only polls the keypad
    /// - otherwise gets and executes the next opcode
    pub fn cycle(&mut self) -> Result<(), Error> {
        match self.state.mode {
            Mode::Running => self.advance_cpu()?,
            Mode::AwaitingKey { register } => self.poll_key(register),
        }
        self.advance_timers();
        Ok(())
    }

    /// Fetches the opcode at pc, moves pc past it, and executes it
    fn advance_cpu(&mut self) -> Result<(), Error> {
        let op: u16 = self.get_op()?;
        trace!(
            "{:04X} v{:02X?} i{:04X} pc{:04X}",
            op,
            self.state.v,
            self.state.i,
            self.state.pc
        );
        self.state.pc += 0x2;
        let operation = self.dispatcher.resolve(op);
        operation(&op, &mut self.state)
    }

    /// Completes a pending Fx0A once any key is held
    fn poll_key(&mut self, register: u8) {
        if let Some(key) = self.state.pressed_key() {
            self.state.v[register as usize] = key;
            self.state.pc += 0x2;
            self.state.mode = Mode::Running;
        }
    }

    /// Decrements both timers, stopping at 0
    fn advance_timers(&mut self) {
        self.state.delay_timer = self.state.delay_timer.saturating_sub(1);
        self.state.sound_timer = self.state.sound_timer.saturating_sub(1);
    }

    /// Gets the opcode currently pointed at by the pc.
    /// Memory is stored as bytes, but opcodes are 16 bits so we combine two subsequent bytes.
    fn get_op(&self) -> Result<u16, Error> {
        let bytes = self.state.memory_slice(self.state.pc, 2)?;
        Ok(u16::from(bytes[0]) << 8 | u16::from(bytes[1]))
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::constants::PIXEL_ON;

    /// A Chip-8 with `program` loaded at 0x200
    fn with_program(program: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load_rom(&mut &program[..]).unwrap();
        chip8
    }

    struct UnreadableRom;

    impl Read for UnreadableRom {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "unreadable"))
        }
    }

    #[test]
    fn test_chip8_gets_op() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0xAA, 0xBB]);
        assert_eq!(chip8.get_op().unwrap(), 0xAABB);
    }

    #[test]
    fn test_get_op_past_memory() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.state.pc = 0xFFF;
        assert!(matches!(
            chip8.cycle(),
            Err(Error::MemoryOutOfBounds { address: 0x1000 })
        ));
    }

    #[test]
    fn test_loads_rom_at_program_start() {
        let chip8 = with_program(&[0x12, 0x34, 0x56]);
        assert_eq!(chip8.state.memory[0x200..0x203], [0x12, 0x34, 0x56]);
        assert_eq!(chip8.state.memory[0x1FF], 0x0);
        assert_eq!(chip8.state.memory[0x50], 0xF0);
    }

    #[test]
    fn test_loads_rom_filling_memory() {
        let rom = vec![0xAB; MAX_ROM_SIZE];
        let chip8 = with_program(&rom);
        assert_eq!(chip8.state.memory[0xFFF], 0xAB);
    }

    #[test]
    fn test_rejects_oversized_rom() {
        let mut chip8 = Chip8::with_seed(0);
        let rom = vec![0xAB; MAX_ROM_SIZE + 1];
        match chip8.load_rom(&mut &rom[..]) {
            Err(Error::RomTooLarge { size, max }) => {
                assert_eq!(size, MAX_ROM_SIZE + 1);
                assert_eq!(max, 0xE00);
            }
            _ => panic!("expected the rom to be rejected"),
        }
        assert_eq!(chip8.state.memory[0x200], 0x0);
    }

    #[test]
    fn test_unreadable_rom_fails() {
        let mut chip8 = Chip8::with_seed(0);
        assert!(matches!(
            chip8.load_rom(&mut UnreadableRom),
            Err(Error::Io(_))
        ));
        assert!(chip8.state.memory[0x200..].iter().all(|&b| b == 0x0));
    }

    #[test]
    fn test_missing_rom_file_fails() {
        let mut chip8 = Chip8::with_seed(0);
        assert!(matches!(
            chip8.load_rom_file("this/rom/does/not/exist.ch8"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_cycle_advances_pc() {
        // 6xkk doesn't touch pc itself
        let mut chip8 = with_program(&[0x61, 0x22]);
        let starting_pc = chip8.state.pc;
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, starting_pc + 0x2);
        assert_eq!(chip8.state.v[0x1], 0x22);
    }

    #[test]
    fn test_cycle_skips() {
        // v1 == 0, so 3100 skips and 3101 doesn't
        let mut chip8 = with_program(&[0x31, 0x00, 0x00, 0x00, 0x31, 0x01]);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, 0x204);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, 0x206);
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let mut chip8 = with_program(&[0xF1, 0xFF]);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, 0x202);
    }

    #[test]
    fn test_call_and_return() {
        let mut chip8 = with_program(&[0x23, 0x00]);
        chip8.state.memory[0x300..0x302].copy_from_slice(&[0x00, 0xEE]);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, 0x300);
        assert_eq!(chip8.state.sp, 0x1);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, 0x202);
        assert_eq!(chip8.state.sp, 0x0);
    }

    #[test]
    fn test_stack_overflow_is_reported() {
        // 2200 calls itself forever
        let mut chip8 = with_program(&[0x22, 0x00]);
        for _ in 0..16 {
            chip8.cycle().unwrap();
        }
        assert!(matches!(
            chip8.cycle(),
            Err(Error::StackOverflow { pc: 0x200 })
        ));
    }

    #[test]
    fn test_cycle_decrements_timers() {
        let mut chip8 = with_program(&[0x61, 0x00, 0x61, 0x00]);
        chip8.state.delay_timer = 0x2;
        chip8.state.sound_timer = 0x1;
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.delay_timer, 0x1);
        assert_eq!(chip8.state.sound_timer, 0x0);
        assert!(!chip8.sound_active());
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.delay_timer, 0x0);
        assert_eq!(chip8.state.sound_timer, 0x0);
    }

    #[test]
    fn test_timers_are_set_then_counted_down() {
        // v1 = 3; DT = v1; ST = v1
        let mut chip8 = with_program(&[0x61, 0x03, 0xF1, 0x15, 0xF1, 0x18]);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.delay_timer, 0x2);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.delay_timer, 0x1);
        assert_eq!(chip8.state.sound_timer, 0x2);
        assert!(chip8.sound_active());
    }

    #[test]
    fn test_doesnt_advance_while_awaiting_key() {
        let mut chip8 = with_program(&[0xF1, 0x0A]);
        chip8.state.delay_timer = 0x5;
        let starting_pc = chip8.state.pc;
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, starting_pc);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, starting_pc);
        assert_eq!(chip8.state.mode, Mode::AwaitingKey { register: 0x1 });
        // timers keep running while parked
        assert_eq!(chip8.state.delay_timer, 0x3);
    }

    #[test]
    fn test_captures_key_presses() {
        let mut chip8 = with_program(&[0xF1, 0x0A, 0x62, 0x07]);
        chip8.cycle().unwrap();
        chip8.key_press(0xE);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.mode, Mode::Running);
        assert_eq!(chip8.state.v[0x1], 0xE);
        assert_eq!(chip8.state.pc, 0x202);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.v[0x2], 0x7);
    }

    #[test]
    fn test_key_release() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.key_press(0x3);
        assert_eq!(chip8.state.keypad[0x3], 0x1);
        chip8.key_release(0x3);
        assert_eq!(chip8.state.keypad[0x3], 0x0);
        chip8.keypad_mut()[0x4] = 0x1;
        assert_eq!(chip8.state.pressed_key(), Some(0x4));
    }

    #[test]
    fn test_keys_outside_keypad_are_ignored() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.key_press(0x10);
        chip8.key_release(0xFF);
        assert_eq!(chip8.state.pressed_key(), None);
    }

    #[test]
    fn test_draw_zero_rows_at_power_on() {
        // i is still 0 when Dxy0 runs
        let mut chip8 = with_program(&[0xD0, 0x00]);
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.pc, 0x202);
        assert_eq!(chip8.state.v[0xF], 0x0);
        assert!(chip8
            .frame_buffer()
            .iter()
            .all(|row| row.iter().all(|&pixel| pixel == 0x0)));
    }

    #[test]
    fn test_drawing_twice_restores_frame() {
        // i = font 0; draw it at (v0, v0); draw it again
        let mut chip8 = with_program(&[0xA0, 0x50, 0xD0, 0x05, 0xD0, 0x05]);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.v[0xF], 0x0);
        assert!(chip8.get_frame().is_some());
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.v[0xF], 0x1);
        assert!(chip8
            .frame_buffer()
            .iter()
            .all(|row| row.iter().all(|&pixel| pixel == 0x0)));
    }

    #[test]
    fn test_clear_then_draw() {
        // cls; i = 0x300; draw one full row at (v0, v0)
        let mut chip8 = with_program(&[0x00, 0xE0, 0xA3, 0x00, 0xD0, 0x01]);
        chip8.state.memory[0x300] = 0xFF;
        chip8.state.frame_buffer[10][10] = PIXEL_ON;
        chip8.cycle().unwrap();
        assert!(chip8
            .frame_buffer()
            .iter()
            .all(|row| row.iter().all(|&pixel| pixel == 0x0)));
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.state.v[0xF], 0x0);
        let lit: usize = chip8
            .frame_buffer()
            .iter()
            .map(|row| row.iter().filter(|&&pixel| pixel == PIXEL_ON).count())
            .sum();
        assert_eq!(lit, 8);
        assert_eq!(chip8.frame_buffer()[0][0..8], [PIXEL_ON; 8]);
    }

    #[test]
    fn test_get_frame_resets_draw_flag() {
        let mut chip8 = with_program(&[0x00, 0xE0]);
        assert!(chip8.get_frame().is_none());
        chip8.cycle().unwrap();
        assert!(chip8.get_frame().is_some());
        assert!(chip8.get_frame().is_none());
    }

    #[test]
    fn test_seeded_chip8s_agree() {
        let program = [0xC1, 0xFF, 0xC2, 0xFF];
        let mut a = Chip8::with_seed(99);
        let mut b = Chip8::with_seed(99);
        a.load_rom(&mut &program[..]).unwrap();
        b.load_rom(&mut &program[..]).unwrap();
        for _ in 0..2 {
            a.cycle().unwrap();
            b.cycle().unwrap();
        }
        assert_eq!(a.state.v, b.state.v);
    }
}
