use emu_chip8::Chip8System;
use emu_core::System;

/// Draws the glyphs 0-3 and prints the screen without a window.
fn main() {
    let program: [u16; 10] = [
        0x6000, // LD V0, 0    glyph
        0x6100, // LD V1, 0    x
        0x6200, // LD V2, 0    y
        0xF029, // LD F, V0
        0xD125, // DRW V1, V2, 5
        0x7001, // ADD V0, 1
        0x7105, // ADD V1, 5
        0x3004, // SE V0, 4
        0x1206, // JP 0x206
        0x1212, // JP self
    ];
    let rom: Vec<u8> = program.iter().flat_map(|w| w.to_be_bytes()).collect();

    let mut sys = Chip8System::default();
    if let Err(e) = sys.mount("Program", &rom) {
        eprintln!("mount failed: {}", e);
        return;
    }
    for _ in 0..10 {
        if let Err(e) = sys.step_frame() {
            eprintln!("fault: {}", e);
            break;
        }
    }

    let frame = sys.frame();
    for y in 0..8 {
        let row: String = (0..24)
            .map(|x| {
                if frame.get(x, y) == Some(emu_core::types::PIXEL_ON) {
                    '#'
                } else {
                    '.'
                }
            })
            .collect();
        println!("{}", row);
    }
    println!("Save-state bytes: {}", sys.save_state().to_string().len());
}
