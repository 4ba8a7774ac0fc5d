use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

/// Draws a segment `stroke` pixels wide with round caps.
pub fn draw_thick_segment(
    canvas: &mut GrayImage,
    start: (f32, f32),
    end: (f32, f32),
    stroke: u32,
    value: u8,
) {
    let color = Luma([value]);
    if stroke <= 1 {
        draw_line_segment_mut(canvas, start, end, color);
        return;
    }

    let half = stroke as f32 / 2.0;
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let length = (dx * dx + dy * dy).sqrt();
    if length >= 1.0 {
        let nx = -dy / length * half;
        let ny = dx / length * half;
        let corners = [
            (start.0 + nx, start.1 + ny),
            (end.0 + nx, end.1 + ny),
            (end.0 - nx, end.1 - ny),
            (start.0 - nx, start.1 - ny),
        ]
        .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32));
        if corners[0] != corners[3] {
            draw_polygon_mut(canvas, &corners, color);
        }
    }

    let radius = (half.round() as i32).max(1);
    for (x, y) in [start, end] {
        draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
    }
}

/// Draws a closed outline through `points` with the given stroke width.
pub fn draw_thick_outline(canvas: &mut GrayImage, points: &[Point<i32>], stroke: u32, value: u8) {
    match points {
        [] => {}
        [only] => {
            let p = (only.x as f32, only.y as f32);
            draw_thick_segment(canvas, p, p, stroke, value);
        }
        _ => {
            for (i, a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                draw_thick_segment(
                    canvas,
                    (a.x as f32, a.y as f32),
                    (b.x as f32, b.y as f32),
                    stroke,
                    value,
                );
            }
        }
    }
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}
