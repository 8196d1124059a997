// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Record, prepare and execute on the Vello CPU backend.

use understory_canvas::kurbo::{Affine, BezPath, Point, Rect, Stroke};
use understory_canvas::peniko::color::Rgba8;
use understory_canvas::peniko::{BlendMode, Compose, Extend, Mix};
use understory_canvas::{
    Canvas, CanvasError, ColorStop, FillRule, Mask, Pixmap, RadialGradient, Result,
};
use understory_canvas_vello_cpu::{CpuRecording, CpuSurface, new_surface};

const WIDTH: u16 = 48;
const HEIGHT: u16 = 48;

fn rgba(r: u8, g: u8, b: u8, a: u8) -> Rgba8 {
    Rgba8 { r, g, b, a }
}

fn star() -> BezPath {
    let mut path = BezPath::new();
    path.move_to((24.0, 2.0));
    path.line_to((38.0, 44.0));
    path.line_to((2.0, 16.0));
    path.line_to((46.0, 16.0));
    path.line_to((10.0, 44.0));
    path.close_path();
    path
}

fn scene(canvas: &mut impl Canvas) -> Result<()> {
    canvas.set_solid_color(rgba(20, 120, 200, 255))?;
    canvas.fill_rect(Rect::new(0.0, 0.0, 48.0, 24.0))?;
    canvas.set_fill_rule(FillRule::EvenOdd)?;
    canvas.push_opacity_layer(0.75)?;
    canvas.set_solid_color(rgba(250, 40, 40, 255))?;
    canvas.fill_path(&star())?;
    canvas.pop_layer()?;
    canvas.set_transform(Affine::translate((4.0, 6.0)) * Affine::scale(0.5))?;
    canvas.set_stroke(Stroke::new(3.0))?;
    canvas.set_radial_gradient(RadialGradient::new(
        Point::new(24.0, 24.0),
        20.0,
        [
            ColorStop::new(0.0, rgba(255, 255, 0, 255)),
            ColorStop::new(1.0, rgba(0, 128, 0, 200)),
        ],
        Extend::Pad,
    )?)?;
    canvas.stroke_rect(Rect::new(8.0, 8.0, 60.0, 60.0))?;
    canvas.push_blend_layer(BlendMode::new(Mix::Multiply, Compose::SrcOver))?;
    canvas.fill_blurred_rounded_rect(Rect::new(20.0, 20.0, 70.0, 50.0), 4.0, 3.0)?;
    canvas.pop_layer()?;
    canvas.reset_transform()?;
    canvas.set_solid_color(rgba(0, 0, 0, 160))?;
    canvas.stroke_path(&star())
}

fn surface() -> CpuSurface {
    new_surface(WIDTH, HEIGHT).unwrap()
}

fn render(surface: &mut CpuSurface) -> Pixmap {
    surface.flush().unwrap();
    let mut pixmap = Pixmap::new(WIDTH, HEIGHT);
    surface.render_to_pixmap(&mut pixmap).unwrap();
    pixmap
}

fn recorded_scene() -> CpuRecording {
    let mut recording = CpuRecording::new();
    recording.record(|rec| scene(rec)).unwrap();
    recording
}

fn assert_same_pixels(a: &Pixmap, b: &Pixmap) {
    for (i, (pa, pb)) in a.data().iter().zip(b.data()).enumerate() {
        assert_eq!(
            pa,
            pb,
            "pixel ({}, {}) differs",
            i % usize::from(WIDTH),
            i / usize::from(WIDTH)
        );
    }
}

#[test]
fn prepared_replay_matches_direct_drawing() {
    let mut direct = surface();
    scene(&mut direct).unwrap();
    let expected = render(&mut direct);

    let mut replayed = surface();
    let mut recording = recorded_scene();
    replayed.prepare(&mut recording).unwrap();
    assert!(recording.has_cached_strips());
    replayed.execute(&recording).unwrap();

    assert_same_pixels(&expected, &render(&mut replayed));
    assert_eq!(direct.state(), replayed.state());
}

#[test]
fn unprepared_replay_matches_direct_drawing() {
    let mut direct = surface();
    scene(&mut direct).unwrap();

    let mut replayed = surface();
    replayed.execute(&recorded_scene()).unwrap();

    assert_same_pixels(&render(&mut direct), &render(&mut replayed));
}

#[test]
fn replay_starts_from_the_target_state() {
    let preset = |s: &mut CpuSurface| {
        s.set_transform(Affine::translate((5.0, 3.0))).unwrap();
        s.set_solid_color(rgba(0, 200, 100, 255)).unwrap();
    };
    let mut direct = surface();
    preset(&mut direct);
    direct.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();

    let mut recording = CpuRecording::new();
    recording
        .record(|rec| rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0)))
        .unwrap();
    let mut replayed = surface();
    preset(&mut replayed);
    replayed.prepare(&mut recording).unwrap();
    replayed.execute(&recording).unwrap();

    let pixmap = render(&mut replayed);
    assert_same_pixels(&render(&mut direct), &pixmap);
    assert_eq!(pixmap.sample(2, 2).unwrap().a, 0, "translated away");
    assert_eq!(pixmap.sample(7, 7).unwrap().g, 200);
}

#[test]
fn executing_twice_draws_twice() {
    let mut recording = CpuRecording::new();
    recording
        .record(|rec| {
            rec.set_solid_color(rgba(0, 0, 255, 255))?;
            rec.push_opacity_layer(0.5)?;
            rec.fill_rect(Rect::new(0.0, 0.0, 48.0, 48.0))?;
            rec.pop_layer()
        })
        .unwrap();

    let mut s = surface();
    s.prepare(&mut recording).unwrap();
    s.execute(&recording).unwrap();
    let once = render(&mut s).sample(10, 10).unwrap().a;
    s.execute(&recording).unwrap();
    let twice = render(&mut s).sample(10, 10).unwrap().a;
    assert!(twice > once, "{twice} > {once}");
}

#[test]
fn preparing_again_never_decreases_statistics() {
    let mut recording = recorded_scene();
    let mut s = surface();

    s.prepare(&mut recording).unwrap();
    let first = recording.stats();
    assert!(first.has_cached_strips);
    assert!(first.strip_count > 0 && first.alpha_count > 0);

    s.prepare(&mut recording).unwrap();
    assert_eq!(recording.stats(), first, "same state: nothing to do");

    s.set_transform(Affine::scale(2.0)).unwrap();
    s.prepare(&mut recording).unwrap();
    let second = recording.stats();
    assert!(second.has_cached_strips);
    assert!(second.strip_count >= first.strip_count);
    assert!(second.alpha_count >= first.alpha_count);
    assert_eq!(recording.prepared_count(), 2);
}

#[test]
fn clearing_drops_commands_and_cache() {
    let mut recording = recorded_scene();
    let mut s = surface();
    s.prepare(&mut recording).unwrap();

    recording.clear();
    assert!(recording.is_empty());
    assert!(!recording.has_cached_strips());
    assert_eq!((recording.strip_count(), recording.alpha_count()), (0, 0));

    s.execute(&recording).unwrap();
    assert!(render(&mut s).data().iter().all(|p| p.a == 0));
}

#[test]
fn failed_execute_leaves_the_surface_usable() {
    let small = Mask::new_alpha(&Pixmap::new(4, 4)).unwrap();
    let mut recording = CpuRecording::new();
    recording
        .record(|rec| {
            rec.set_solid_color(rgba(250, 40, 40, 255))?;
            rec.push_opacity_layer(0.5)?;
            rec.push_mask_layer(&small)?;
            rec.fill_rect(Rect::new(0.0, 0.0, 48.0, 48.0))?;
            rec.pop_layer()?;
            rec.pop_layer()
        })
        .unwrap();

    let mut s = surface();
    assert!(matches!(
        s.execute(&recording),
        Err(CanvasError::InvalidParameter(_))
    ));
    assert_eq!(s.layer_depth(), 0);
    assert_eq!(s.flush(), Ok(()));

    // Preparing validates the mask up front.
    assert!(s.prepare(&mut recording).is_err());
    assert_eq!(recording.prepared_count(), 0);
    assert!(render(&mut s).data().iter().all(|p| p.a == 0));
}
