use std::sync::Arc;

use easel::{
    image::MemorySource, Color, CommandOutput, Display, ImageEvent, InlineThreadPool, Operand,
    RawCommand, Session,
};

fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Trace)
        .init();
}

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut bytes, image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn raw(op: &str, operands: impl IntoIterator<Item = Operand>) -> RawCommand {
    RawCommand::new(op, operands)
}

fn numbers<const N: usize>(values: [f32; N]) -> Vec<Operand> {
    values.iter().map(|&v| Operand::from(v)).collect()
}

#[test]
fn wire_frame_with_images_and_scroll() {
    init_logging();

    let mut display = Display::new();
    let visible = display.add_target("canvas", 16, 16).unwrap();

    let mut source = MemorySource::new();
    source.insert("file:///sprites/green.png", png(4, 4, [0, 255, 0, 255]));
    let mut session = Session::builder(&display, "canvas")
        .image_source(source)
        .thread_pool(Arc::new(InlineThreadPool))
        .build()
        .unwrap();

    // The first frame requests the image. It cannot be drawn yet.
    let frame = vec![
        raw("loadImage", ["sprite".into(), "file:///sprites/green.png".into()]),
        raw("drawImage", ["sprite".into(), 0.into(), 0.into()]),
    ];
    session.execute_raw(&frame);
    session.present();
    assert_eq!(visible.pixel(0, 0), Some(Color::TRANSPARENT));

    let events = session.poll_images();
    assert!(matches!(&events[..], [ImageEvent::Loaded { name, .. }] if name == "sprite"));

    let mut frame = vec![
        raw("fillStyle", ["#ff0000".into()]),
        raw("fillRect", numbers([0., 0., 16., 16.])),
        raw("drawImage", ["sprite".into(), 0.into(), 0.into()]),
        raw("notAnOperation", []),
        raw("beginPath", []),
        raw("rect", numbers([8., 8., 4., 4.])),
        raw("isPointInPath", numbers([9., 9.])),
        raw("measureText", ["abc".into()]),
    ];
    let mut scroll = numbers([0., 0., 16., 16., 0., 2.]);
    scroll.push("blue".into());
    frame.push(raw("scroll", scroll));

    let results = session.execute_raw(&frame);
    assert_eq!(results.len(), frame.len());
    assert_eq!(results[6], Some(CommandOutput::PointInPath(true)));
    assert!(matches!(results[7], Some(CommandOutput::TextMetrics(_))));
    assert!(results
        .iter()
        .enumerate()
        .all(|(i, r)| r.is_none() || i == 6 || i == 7));

    // Nothing is visible until the frame is presented.
    assert_eq!(visible.pixel(0, 5), Some(Color::TRANSPARENT));
    session.present();

    let green = Color::rgb(0, 255, 0);
    let red = Color::rgb(255, 0, 0);
    let blue = Color::rgb(0, 0, 255);
    // Scrolled down by two rows: the sprite now covers rows 2..6.
    assert_eq!(visible.pixel(0, 0), Some(blue));
    assert_eq!(visible.pixel(15, 1), Some(blue));
    assert_eq!(visible.pixel(0, 2), Some(green));
    assert_eq!(visible.pixel(3, 5), Some(green));
    assert_eq!(visible.pixel(0, 6), Some(red));
    assert_eq!(visible.pixel(10, 10), Some(red));
}

#[test]
fn direct_calls_match_batches() {
    let mut display = Display::new();
    let direct_target = display.add_target("direct", 8, 8).unwrap();
    let batched_target = display.add_target("batched", 8, 8).unwrap();

    let mut direct = Session::create(&display, "direct", false).unwrap();
    direct.set_fill_style(Color::rgb(10, 20, 30));
    direct.translate(2., 2.);
    direct.begin_path();
    direct.arc(2., 2., 2., 0., std::f32::consts::TAU, false);
    direct.fill();

    let mut batched = Session::create(&display, "batched", false).unwrap();
    batched.execute_raw(&[
        raw("fillStyle", ["rgb(10, 20, 30)".into()]),
        raw("translate", numbers([2., 2.])),
        raw("beginPath", []),
        raw("arc", numbers([2., 2., 2., 0., std::f32::consts::TAU])),
        raw("fill", []),
    ]);

    assert_eq!(direct_target.to_argb(), batched_target.to_argb());
    assert_eq!(direct_target.pixel(4, 4), Some(Color::rgb(10, 20, 30)));
}

#[test]
fn redundant_present_is_idempotent() {
    let mut display = Display::new();
    let visible = display.add_target("canvas", 4, 4).unwrap();
    let mut session = Session::create(&display, "canvas", true).unwrap();

    session.fill_rect(0., 0., 2., 2.);
    session.present();
    let first = visible.to_argb();
    session.present();
    assert_eq!(visible.to_argb(), first);
    assert_eq!(
        Some(visible.to_argb()),
        session.active_surface().map(|s| s.to_argb())
    );
}

#[test]
fn huge_scroll_does_not_abort_batch() {
    let mut display = Display::new();
    let visible = display.add_target("canvas", 16, 16).unwrap();
    let mut session = Session::create(&display, "canvas", false).unwrap();

    let mut scroll = numbers([0., 0., 10., 10., -3.0e9, 0.]);
    scroll.push("white".into());
    let results = session.execute_raw(&[
        raw("scroll", scroll),
        raw("fillStyle", ["#ff0000".into()]),
        raw("fillRect", numbers([12., 12., 4., 4.])),
    ]);

    assert_eq!(results.len(), 3);
    assert_eq!(visible.pixel(0, 0), Some(Color::WHITE));
    assert_eq!(visible.pixel(9, 0), Some(Color::TRANSPARENT));
    assert_eq!(visible.pixel(13, 13), Some(Color::rgb(255, 0, 0)));
}
