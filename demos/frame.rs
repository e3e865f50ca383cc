//! Draws a frame through a wire batch and writes the presented
//! target to `frame.png`.

use std::f32::consts::TAU;

use easel::{Color, Display, Operand, RawCommand, Session};
use simple_logger::SimpleLogger;

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init()?;

    let (width, height) = (320, 200);
    let mut display = Display::new();
    let target = display
        .add_target("canvas", width, height)
        .ok_or_else(|| anyhow::anyhow!("zero-sized target"))?;
    let mut session = Session::builder(&display, "canvas")
        .load_system_fonts(true)
        .build()?;

    let n = |v: f32| Operand::from(v);
    let frame = [
        RawCommand::new("fillStyle", ["#202830".into()]),
        RawCommand::new("fillRect", [n(0.), n(0.), n(320.), n(200.)]),
        RawCommand::new("shadowColor", ["rgba(0, 0, 0, 0.5)".into()]),
        RawCommand::new("shadowOffsetX", [n(4.)]),
        RawCommand::new("shadowOffsetY", [n(4.)]),
        RawCommand::new("fillStyle", ["orange".into()]),
        RawCommand::new("beginPath", []),
        RawCommand::new("arc", [n(80.), n(100.), n(50.), n(0.), n(TAU)]),
        RawCommand::new("fill", []),
        RawCommand::new("strokeStyle", ["white".into()]),
        RawCommand::new("lineWidth", [n(3.)]),
        RawCommand::new("strokeRect", [n(160.), n(50.), n(120.), n(100.)]),
        RawCommand::new("font", ["bold 24px sans-serif".into()]),
        RawCommand::new("fillStyle", ["white".into()]),
        RawCommand::new("fillText", ["easel".into(), n(180.), n(110.)]),
        RawCommand::new("measureText", ["easel".into()]),
    ];
    let results = session.execute_raw(&frame);
    log::info!("measureText: {:?}", results.last());

    session.scroll(0., 0., 320., 200., 0., -10., Some(Color::rgb(32, 40, 48)));
    session.present();

    let pixels: Vec<u8> = target
        .to_argb()
        .into_iter()
        .flat_map(|argb| {
            let [a, r, g, b] = argb.to_be_bytes();
            [r, g, b, a]
        })
        .collect();
    image::save_buffer("frame.png", &pixels, width, height, image::ColorType::Rgba8)?;
    log::info!("Wrote frame.png");
    Ok(())
}
