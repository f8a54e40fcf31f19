use sdl2::pixels::PixelFormatEnum;
use sdl2::render::WindowCanvas;

use chip8_vm::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH, VIDEO_PITCH};
use chip8_vm::state::FrameBuffer;

/// # Display
/// The Chip-8 display is composed of 64x32 pixels black/white pixels.
/// Each pixel is a full 32-bit value, 0 when off and all ones when on, so the frame buffer can be
/// uploaded as an ARGB8888 texture row by row using `VIDEO_PITCH` as the stride.
/// The display only gets a call to `render` when the Chip-8 FrameBuffer is updated.
pub struct Display {
    canvas: WindowCanvas,
}

impl Display {
    /// Creates a new display object bound to an sdl2 context.
    ///
    /// # Arguments
    /// * `sdl` an sdl2 context with which to draw
    /// * `title` the window title
    /// * `scale` the size multiplier for each pixel
    pub fn new(sdl: &sdl2::Sdl, title: &str, scale: u32) -> Result<Self, String> {
        let video_subsystem = sdl.video()?;
        let window = video_subsystem
            .window(
                title,
                DISPLAY_WIDTH as u32 * scale,
                DISPLAY_HEIGHT as u32 * scale,
            )
            .position_centered()
            .build()
            .map_err(|e| e.to_string())?;
        let canvas = window
            .into_canvas()
            .accelerated()
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Display { canvas })
    }

    /// Flattens a Chip-8 FrameBuffer into the bytes of an ARGB8888 texture.
    ///
    /// Rows are concatenated top to bottom, so each row occupies exactly `VIDEO_PITCH` bytes.
    ///
    /// # Arguments
    /// * `frame` a Chip-8 FrameBuffer
    fn frame_to_sdl_texture(frame: &FrameBuffer) -> Vec<u8> {
        frame
            .iter()
            .flat_map(|row| row.iter())
            .flat_map(|pixel| pixel.to_ne_bytes())
            .collect()
    }

    /// Formats the Chip-8 FrameBuffer as an SDL2 texture and renders it.
    ///
    /// # Arguments
    /// * `frame` a Chip-8 FrameBuffer
    pub fn render(&mut self, frame: &FrameBuffer) -> Result<(), String> {
        let texture_creator = self.canvas.texture_creator();

        let mut texture = texture_creator
            .create_texture_streaming(
                PixelFormatEnum::ARGB8888,
                DISPLAY_WIDTH as u32,
                DISPLAY_HEIGHT as u32,
            )
            .map_err(|e| e.to_string())?;

        texture
            .update(None, &Display::frame_to_sdl_texture(frame), VIDEO_PITCH)
            .map_err(|e| e.to_string())?;

        self.canvas.clear();
        self.canvas.copy(&texture, None, None)?;
        self.canvas.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chip8_vm::constants::PIXEL_ON;

    #[test]
    fn test_frame_to_sdl_texture() {
        let mut frame: FrameBuffer = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
        frame[0][0..2].copy_from_slice(&[0, PIXEL_ON]);
        frame[1][0..2].copy_from_slice(&[PIXEL_ON, 0]);
        let frame = Display::frame_to_sdl_texture(&frame);

        let mut expected: Vec<u8> = vec![0; VIDEO_PITCH * DISPLAY_HEIGHT];
        expected[0..8].copy_from_slice(&[0, 0, 0, 0, 255, 255, 255, 255]);
        expected[256..264].copy_from_slice(&[255, 255, 255, 255, 0, 0, 0, 0]);

        assert_eq!(frame, expected);
    }
}
