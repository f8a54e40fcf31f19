//! Instruction handlers.
//!
//! Every handler runs after the fetch step has already moved `pc` past the opcode,
//! so skips add a further 2 and jumps overwrite `pc` outright.

use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_SPRITE_SIZE, FONT_START, PIXEL_ON, REGISTER_COUNT,
    STACK_LEVELS,
};
use crate::error::Error;
use crate::opcode::Opcode;
use crate::state::{Mode, State};

/// A single instruction's effect on the state
pub type Operation = fn(op: &dyn Opcode, state: &mut State) -> Result<(), Error>;

/// Skips the next instruction when `condition` holds
fn skip_if(state: &mut State, condition: bool) {
    if condition {
        state.pc += 0x2;
    }
}

/// Unrecognised opcodes do nothing
pub fn nop(_op: &dyn Opcode, _state: &mut State) -> Result<(), Error> {
    Ok(())
}

/// clear
pub fn clr(_op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.frame_buffer = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
    state.draw_flag = true;
    Ok(())
}

/// PC = STACK.pop()
pub fn rts(_op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    if state.sp == 0 {
        return Err(Error::StackUnderflow { pc: state.pc - 0x2 });
    }
    state.sp -= 0x1;
    state.pc = state.stack[state.sp as usize];
    Ok(())
}

/// PC = addr
pub fn jump(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.pc = op.addr();
    Ok(())
}

/// STACK.push(PC); PC = addr
pub fn call(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    if state.sp as usize >= STACK_LEVELS {
        return Err(Error::StackOverflow { pc: state.pc - 0x2 });
    }
    state.stack[state.sp as usize] = state.pc;
    state.sp += 0x1;
    state.pc = op.addr();
    Ok(())
}

/// if Vx == kk then pc += 2
pub fn ske(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let condition = state.v[op.x() as usize] == op.kk();
    skip_if(state, condition);
    Ok(())
}

/// if Vx != kk then pc += 2
pub fn skne(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let condition = state.v[op.x() as usize] != op.kk();
    skip_if(state, condition);
    Ok(())
}

/// if Vx == Vy then pc += 2
pub fn skre(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let condition = state.v[op.x() as usize] == state.v[op.y() as usize];
    skip_if(state, condition);
    Ok(())
}

/// Vx = kk
pub fn load(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.v[op.x() as usize] = op.kk();
    Ok(())
}

/// Vx += kk
/// Add kk to Vx; allow for overflow but implicitly drop it, VF is untouched
pub fn add(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let x = op.x() as usize;
    state.v[x] = state.v[x].wrapping_add(op.kk());
    Ok(())
}

/// Vx = Vy
pub fn mv(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.v[op.x() as usize] = state.v[op.y() as usize];
    Ok(())
}

/// Vx |= Vy
pub fn or(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.v[op.x() as usize] |= state.v[op.y() as usize];
    Ok(())
}

/// Vx &= Vy
pub fn and(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.v[op.x() as usize] &= state.v[op.y() as usize];
    Ok(())
}

/// Vx ^= Vy
pub fn xor(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.v[op.x() as usize] ^= state.v[op.y() as usize];
    Ok(())
}

// The flag setting arithmetic below computes its result from the operands as they were
// before the instruction, then writes VF, then Vx. When x is F the result wins.

/// Vx += Vy; VF = overflow
pub fn addr(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let (res, over) = state.v[op.x() as usize].overflowing_add(state.v[op.y() as usize]);
    state.v[0xF] = u8::from(over);
    state.v[op.x() as usize] = res;
    Ok(())
}

/// Vx -= Vy; VF = !borrow
pub fn sub(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let (vx, vy) = (state.v[op.x() as usize], state.v[op.y() as usize]);
    state.v[0xF] = u8::from(vx >= vy);
    state.v[op.x() as usize] = vx.wrapping_sub(vy);
    Ok(())
}

/// Vx >>= 1; VF = the bit shifted out
/// Only Vx is shifted, Vy is ignored
pub fn shr(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let vx = state.v[op.x() as usize];
    state.v[0xF] = vx & 0x1;
    state.v[op.x() as usize] = vx >> 1;
    Ok(())
}

/// Vx = Vy - Vx; VF = !borrow
pub fn subn(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let (vx, vy) = (state.v[op.x() as usize], state.v[op.y() as usize]);
    state.v[0xF] = u8::from(vy >= vx);
    state.v[op.x() as usize] = vy.wrapping_sub(vx);
    Ok(())
}

/// Vx <<= 1; VF = the bit shifted out
/// Only Vx is shifted, Vy is ignored
pub fn shl(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let vx = state.v[op.x() as usize];
    state.v[0xF] = (vx & 0x80) >> 7;
    state.v[op.x() as usize] = vx << 1;
    Ok(())
}

/// if Vx != Vy then pc +=2
pub fn skrne(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let condition = state.v[op.x() as usize] != state.v[op.y() as usize];
    skip_if(state, condition);
    Ok(())
}

/// I = addr
pub fn loadi(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.i = op.addr();
    Ok(())
}

/// PC = V0 + addr
pub fn jumpi(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.pc = u16::from(state.v[0x0]) + op.addr();
    Ok(())
}

/// Vx = rand_byte & kk
pub fn rand(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let rand_byte = state.random_byte();
    state.v[op.x() as usize] = rand_byte & op.kk();
    Ok(())
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs a sprite from memory i..i+n at position x, y on the FrameBuffer with wrapping.
/// Sets VF if any pixels were erased
pub fn draw(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let rows = op.n() as usize;
    let mut sprite = [0; 0xF];
    sprite[..rows].copy_from_slice(state.memory_slice(state.i, rows)?);

    let origin_x = state.v[op.x() as usize] as usize;
    let origin_y = state.v[op.y() as usize] as usize;
    let mut collision = 0x0;

    for (row, byte) in sprite[..rows].iter().enumerate() {
        let y = (origin_y + row) % DISPLAY_HEIGHT;
        for bit in 0..8 {
            if byte & (0x80 >> bit) == 0 {
                continue;
            }
            let x = (origin_x + bit) % DISPLAY_WIDTH;
            let pixel = &mut state.frame_buffer[y][x];
            if *pixel == PIXEL_ON {
                collision = 0x1;
            }
            *pixel ^= PIXEL_ON;
        }
    }

    state.v[0xF] = collision;
    state.draw_flag = true;
    Ok(())
}

/// if Vx.pressed then pc += 2
pub fn skpr(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let key = state.v[op.x() as usize] as usize;
    let condition = state.keypad.get(key).map_or(false, |&k| k != 0x0);
    skip_if(state, condition);
    Ok(())
}

/// if !Vx.pressed then pc += 2
pub fn skup(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let key = state.v[op.x() as usize] as usize;
    let condition = state.keypad.get(key).map_or(true, |&k| k == 0x0);
    skip_if(state, condition);
    Ok(())
}

/// Vx = DT
pub fn getdt(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.v[op.x() as usize] = state.delay_timer;
    Ok(())
}

/// await keypress for Vx
/// With no key held the CPU parks on this instruction until one is
pub fn keyd(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    match state.pressed_key() {
        Some(key) => state.v[op.x() as usize] = key,
        None => {
            state.mode = Mode::AwaitingKey { register: op.x() };
            state.pc -= 0x2;
        }
    }
    Ok(())
}

/// DT = Vx
pub fn setdt(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.delay_timer = state.v[op.x() as usize];
    Ok(())
}

/// ST = Vx
pub fn setst(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.sound_timer = state.v[op.x() as usize];
    Ok(())
}

/// I += Vx
pub fn addi(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.i = state.i.wrapping_add(u16::from(state.v[op.x() as usize]));
    Ok(())
}

/// I = FONT_START + Vx * 5
/// Set I to the memory address of the font sprite for Vx
pub fn ldspr(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    state.i = FONT_START + u16::from(state.v[op.x() as usize]) * FONT_SPRITE_SIZE;
    Ok(())
}

/// mem[I..I+3] = bcd(Vx)
/// Store BCD repr of Vx in memory starting at address i
pub fn bcd(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let vx = state.v[op.x() as usize];
    let digits = [vx / 100, vx / 10 % 10, vx % 10];
    state
        .memory_slice_mut(state.i, digits.len())?
        .copy_from_slice(&digits);
    Ok(())
}

/// mem[I..=I+x] = V0..=Vx
/// I itself is left untouched
pub fn stor(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let len = op.x() as usize + 1;
    let v = state.v;
    state
        .memory_slice_mut(state.i, len)?
        .copy_from_slice(&v[..len]);
    Ok(())
}

/// V0..=Vx = mem[I..=I+x]
/// I itself is left untouched
pub fn read(op: &dyn Opcode, state: &mut State) -> Result<(), Error> {
    let len = op.x() as usize + 1;
    let mut values = [0; REGISTER_COUNT];
    values[..len].copy_from_slice(state.memory_slice(state.i, len)?);
    state.v[..len].copy_from_slice(&values[..len]);
    Ok(())
}
