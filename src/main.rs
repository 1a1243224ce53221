use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use label_paint::{
    BrushShape, ConflictResolution, LabelCommand, LabelMapPainter, LabelVolumeState,
    PainterConfig, PointerButton, PointerEvent, RedrawPolicy, ViewportConfig, ViewportRenderer,
};
use log::info;
use ndarray::Array2;

/// Paint a few strokes onto a synthetic volume and save the rendered frame.
#[derive(Parser, Debug)]
#[command(name = "label-paint", version)]
struct Args {
    /// Where the rendered canvas is written.
    #[arg(short, long, default_value = "frame.png")]
    output: PathBuf,

    /// Rows and columns of each slice.
    #[arg(long, default_value_t = 128)]
    size: usize,

    #[arg(long, default_value_t = 16)]
    depth: usize,

    #[arg(long, default_value_t = 6)]
    radius: u32,

    #[arg(long)]
    square: bool,

    /// Show row 0 at the bottom of the canvas.
    #[arg(long)]
    flip: bool,
}

/// Concentric rings so the underlay has some structure to paint over.
fn synthetic_underlay(size: usize) -> Array2<f32> {
    let center = size as f32 / 2.0;
    Array2::from_shape_fn((size, size), |(r, c)| {
        let d = ((r as f32 - center).powi(2) + (c as f32 - center).powi(2)).sqrt();
        (d / 6.0).sin() * 100.0 + 200.0
    })
}

/// Press at the first point, drag through the rest, release at the last.
fn drag(painter: &mut LabelMapPainter<'_>, button: PointerButton, points: &[(f32, f32)]) {
    let Some((&(x, y), rest)) = points.split_first() else {
        return;
    };
    painter.handle_pointer(PointerEvent::Press { x, y, button });
    for &(x, y) in rest {
        painter.handle_pointer(PointerEvent::Drag { x, y });
    }
    let (x, y) = points.last().copied().unwrap_or((x, y));
    painter.handle_pointer(PointerEvent::Release { x, y });
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut state = LabelVolumeState::with_dim((args.size, args.size, args.depth))?;
    let organ = state.add_next_label().ok_or("no free label ID")?;
    let lesion = state.add_next_label().ok_or("no free label ID")?;

    let mut viewport = ViewportRenderer::new(ViewportConfig {
        flip_rows: args.flip,
        ..ViewportConfig::default()
    });
    viewport.set_image(synthetic_underlay(args.size));

    let shape = if args.square { BrushShape::Square } else { BrushShape::Circle };
    let config = PainterConfig {
        brush_shape: shape,
        brush_radius: args.radius,
        redraw: RedrawPolicy::Immediate,
        ..PainterConfig::default()
    };
    let mut painter = LabelMapPainter::new(&mut viewport, config);
    painter.set_label_volume(&mut state, 2, args.depth / 2)?;
    painter.attach();

    let (width, height) = painter.viewport().canvas_size();
    let (w, h) = (width as f32, height as f32);

    painter.set_active_label(Some(organ));
    let outline = [(w * 0.2, h * 0.3), (w * 0.8, h * 0.3), (w * 0.8, h * 0.7)];
    drag(&mut painter, PointerButton::Primary, &outline);
    painter.set_active_label(Some(lesion));
    drag(&mut painter, PointerButton::Primary, &[(w * 0.5, h * 0.5), (w * 0.6, h * 0.6)]);
    drag(&mut painter, PointerButton::Secondary, &[(w * 0.5, h * 0.3)]);

    painter.apply(LabelCommand::rename(lesion, "Lesion"))?;
    painter.apply(LabelCommand::ChangeId {
        old: lesion,
        new: organ,
        resolution: Some(ConflictResolution::Merge),
    })?;
    painter.handle_pointer(PointerEvent::Move { x: w * 0.5, y: h * 0.5 });

    let frame = painter.viewport_mut().frame().clone();
    frame.save(&args.output)?;
    info!("Saved frame to {}", args.output.display());

    let state = painter.detach().ok_or("painter lost its volume")?;
    state.validate()?;
    info!(
        "Painted {} voxels with {} label(s)",
        state.volume().count(organ.get()),
        state.labels().len()
    );
    Ok(())
}
