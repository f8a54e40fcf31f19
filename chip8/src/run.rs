use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use log::info;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

use chip8_vm::Chip8;
use display::Display;

use crate::keymap::keymap;

/// Runs `rom` until the window is closed or Escape is pressed.
///
/// # Arguments
/// * `rom` path to a raw ROM image
/// * `scale` the size multiplier for each pixel
/// * `cycle_time` the minimum time between two cycles
pub fn run(rom: &Path, scale: u32, cycle_time: Duration) -> anyhow::Result<()> {
    let mut chip8: Chip8 = Chip8::new();

    // Load ROM
    chip8
        .load_rom_file(rom)
        .with_context(|| format!("unable to load ROM {}", rom.display()))?;
    info!("successfully loaded ROM {}", rom.display());

    // Get SDL2 context
    let sdl: sdl2::Sdl = sdl2::init().map_err(|e| anyhow!(e))?;
    let mut display: Display = Display::new(&sdl, "Chip-8", scale).map_err(|e| anyhow!(e))?;
    let mut events = sdl.event_pump().map_err(|e| anyhow!(e))?;

    let mut last_cycle: Instant = Instant::now();

    'event: loop {
        // Handle input
        for event in events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'event,
                Event::KeyDown {
                    keycode: Some(key), ..
                } => {
                    if let Some(kc) = keymap(key) {
                        chip8.key_press(kc);
                    }
                }
                Event::KeyUp {
                    keycode: Some(key), ..
                } => {
                    if let Some(kc) = keymap(key) {
                        chip8.key_release(kc);
                    }
                }
                _ => continue,
            };
        }

        // Handle timing
        let elapsed_cycle_time = last_cycle.elapsed();
        if elapsed_cycle_time < cycle_time {
            std::thread::sleep(cycle_time - elapsed_cycle_time);
            continue;
        }
        last_cycle = Instant::now();

        // Update state
        chip8.cycle()?;

        // If the draw flag is set, unset it and render the current frame
        if let Some(frame) = chip8.get_frame() {
            display.render(frame).map_err(|e| anyhow!(e))?;
        }
    }

    info!("window closed, stopping");
    Ok(())
}
