use log::debug;

use crate::opcode::Opcode;
use crate::operations::*;

/// The secondary tables, for the groups whose high nibble alone doesn't pick an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    /// `0___`, keyed by the last nibble
    System,
    /// `8___`, keyed by the last nibble
    Arithmetic,
    /// `E___`, keyed by the last nibble
    Keypad,
    /// `F___`, keyed by the last byte
    Misc,
}

/// An entry of the primary table
#[derive(Clone, Copy)]
pub enum Route {
    Direct(Operation),
    Secondary(Table),
}

/// # Dispatcher
/// Selects the Operation for an Opcode in two steps:
/// 1. the primary table, keyed by the Opcode's high nibble
/// 2. for groups 0, 8, E and F, a secondary table keyed by the low nibble or byte
///
/// Anything without an entry resolves to `nop`.
pub struct Dispatcher {
    primary: [Route; 0x10],
    system: [Option<Operation>; 0xF],
    arithmetic: [Option<Operation>; 0xF],
    keypad: [Option<Operation>; 0xF],
    misc: [Option<Operation>; 0x66],
}

impl Dispatcher {
    pub fn new() -> Self {
        let primary = [
            Route::Secondary(Table::System),     // 0___
            Route::Direct(jump),                 // 1nnn
            Route::Direct(call),                 // 2nnn
            Route::Direct(ske),                  // 3xkk
            Route::Direct(skne),                 // 4xkk
            Route::Direct(skre),                 // 5xy0
            Route::Direct(load),                 // 6xkk
            Route::Direct(add),                  // 7xkk
            Route::Secondary(Table::Arithmetic), // 8xy_
            Route::Direct(skrne),                // 9xy0
            Route::Direct(loadi),                // Annn
            Route::Direct(jumpi),                // Bnnn
            Route::Direct(rand),                 // Cxkk
            Route::Direct(draw),                 // Dxyn
            Route::Secondary(Table::Keypad),     // Ex__
            Route::Secondary(Table::Misc),       // Fx__
        ];

        let mut system: [Option<Operation>; 0xF] = [None; 0xF];
        system[0x0] = Some(clr);
        system[0xE] = Some(rts);

        let mut arithmetic: [Option<Operation>; 0xF] = [None; 0xF];
        arithmetic[0x0] = Some(mv);
        arithmetic[0x1] = Some(or);
        arithmetic[0x2] = Some(and);
        arithmetic[0x3] = Some(xor);
        arithmetic[0x4] = Some(addr);
        arithmetic[0x5] = Some(sub);
        arithmetic[0x6] = Some(shr);
        arithmetic[0x7] = Some(subn);
        arithmetic[0xE] = Some(shl);

        let mut keypad: [Option<Operation>; 0xF] = [None; 0xF];
        keypad[0x1] = Some(skup);
        keypad[0xE] = Some(skpr);

        let mut misc: [Option<Operation>; 0x66] = [None; 0x66];
        misc[0x07] = Some(getdt);
        misc[0x0A] = Some(keyd);
        misc[0x15] = Some(setdt);
        misc[0x18] = Some(setst);
        misc[0x1E] = Some(addi);
        misc[0x29] = Some(ldspr);
        misc[0x33] = Some(bcd);
        misc[0x55] = Some(stor);
        misc[0x65] = Some(read);

        Dispatcher {
            primary,
            system,
            arithmetic,
            keypad,
            misc,
        }
    }

    /// Selects the Operation for an Opcode
    pub fn resolve(&self, op: u16) -> Operation {
        let operation = match self.primary[op.group() as usize] {
            Route::Direct(operation) => Some(operation),
            Route::Secondary(table) => self.secondary(table, op),
        };
        operation.unwrap_or_else(|| {
            debug!("no operation for opcode {:04X}, skipping it", op);
            nop
        })
    }

    fn secondary(&self, table: Table, op: u16) -> Option<Operation> {
        let (entries, index): (&[Option<Operation>], u8) = match table {
            Table::System => (&self.system[..], op.n()),
            Table::Arithmetic => (&self.arithmetic[..], op.n()),
            Table::Keypad => (&self.keypad[..], op.n()),
            Table::Misc => (&self.misc[..], op.kk()),
        };
        entries.get(index as usize).copied().flatten()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
