/// Rasterise a UI tree into a frame and write frames to disk.
///
/// Every node with bounds becomes an outlined box; checked nodes get a
/// filled indicator in their top-right corner.
use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::env::types::{UiNode, UiTree};
use crate::errors::DroidQaResult;

const BACKGROUND: [u8; 4] = [24, 24, 28, 255];

fn node_colour(node: &UiNode) -> [u8; 4] {
    match (node.clickable, node.checked) {
        (_, Some(true)) => [68, 220, 120, 230],  // green
        (_, Some(false)) => [220, 90, 90, 230],  // red
        (true, None) => [80, 160, 255, 220],     // blue
        (false, None) => [160, 160, 160, 180],   // grey
    }
}

/// Draw `tree` on a `width`×`height` canvas. Bounds are clipped to the canvas;
/// inverted rectangles are skipped.
pub fn render_ui_tree(tree: &UiTree, width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(BACKGROUND));
    let thickness: i32 = if width > 800 { 3 } else { 1 };

    for node in &tree.nodes {
        let Some(bounds) = node.bounds else {
            continue;
        };
        if clip(&canvas, bounds).is_none() {
            continue;
        }
        let col = node_colour(node);
        draw_rect(&mut canvas, bounds, col, thickness);

        if node.checked.is_some() {
            let [_, y1, x2, y2] = bounds.map(i64::from);
            let t = i64::from(thickness);
            let size = ((y2 - y1) / 3).max(2);
            let indicator = [x2 - size - t, y1 + t, x2 - t, y1 + t + size].map(saturate);
            fill_rect(&mut canvas, indicator, col);
        }
    }
    canvas
}

pub fn save_png(frame: &RgbaImage, path: &Path) -> DroidQaResult<()> {
    frame.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Intersection of `[x1, y1, x2, y2]` with the canvas, `None` when empty.
fn clip(canvas: &RgbaImage, [x1, y1, x2, y2]: [i32; 4]) -> Option<[i32; 4]> {
    let (w, h) = canvas.dimensions();
    if x2 < x1 || y2 < y1 || w == 0 || h == 0 {
        return None;
    }
    let max_x = saturate(i64::from(w) - 1);
    let max_y = saturate(i64::from(h) - 1);
    if x2 < 0 || y2 < 0 || x1 > max_x || y1 > max_y {
        return None;
    }
    Some([x1.max(0), y1.max(0), x2.min(max_x), y2.min(max_y)])
}

fn draw_rect(canvas: &mut RgbaImage, bounds: [i32; 4], col: [u8; 4], thickness: i32) {
    let Some([cx1, cy1, cx2, cy2]) = clip(canvas, bounds) else {
        return;
    };
    let [x1, y1, x2, y2] = bounds;
    // Edges lying off the canvas are skipped by blend_at.
    for t in 0..thickness {
        for x in cx1..=cx2 {
            blend_at(canvas, x, y1.saturating_add(t), col);
            blend_at(canvas, x, y2.saturating_sub(t), col);
        }
        for y in cy1..=cy2 {
            blend_at(canvas, x1.saturating_add(t), y, col);
            blend_at(canvas, x2.saturating_sub(t), y, col);
        }
    }
}

fn fill_rect(canvas: &mut RgbaImage, rect: [i32; 4], col: [u8; 4]) {
    let Some([x1, y1, x2, y2]) = clip(canvas, rect) else {
        return;
    };
    for y in y1..=y2 {
        for x in x1..=x2 {
            blend_at(canvas, x, y, col);
        }
    }
}

fn blend_at(canvas: &mut RgbaImage, x: i32, y: i32, col: [u8; 4]) {
    let (w, h) = canvas.dimensions();
    if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h {
        return;
    }
    let p = canvas.get_pixel_mut(x as u32, y as u32);
    let a = col[3] as f32 / 255.0;
    for c in 0..3 {
        p[c] = (p[c] as f32 * (1.0 - a) + col[c] as f32 * a).round() as u8;
    }
    p[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle(checked: bool) -> UiNode {
        let mut node = UiNode::new("wifi_toggle", "Wi-Fi");
        node.bounds = Some([10, 10, 50, 30]);
        node.checked = Some(checked);
        node
    }

    #[test]
    fn draws_node_outline_and_leaves_background() {
        let tree = UiTree { nodes: vec![toggle(true)] };
        let frame = render_ui_tree(&tree, 100, 60);
        assert_eq!(frame.dimensions(), (100, 60));
        assert_eq!(frame.get_pixel(0, 0).0, BACKGROUND);
        assert_ne!(frame.get_pixel(10, 20).0, BACKGROUND);
        assert_eq!(frame.get_pixel(30, 20).0, BACKGROUND);
    }

    #[test]
    fn out_of_canvas_bounds_are_clipped() {
        let mut node = UiNode::new("offscreen", "Offscreen");
        node.bounds = Some([-20, -20, 500, 500]);
        let frame = render_ui_tree(&UiTree { nodes: vec![node] }, 40, 40);
        assert_eq!(frame.dimensions(), (40, 40));
    }

    #[test]
    fn extreme_bounds_do_not_overflow() {
        let mut tall = toggle(true);
        tall.bounds = Some([0, i32::MIN, 10, i32::MAX]);
        let mut wide = UiNode::new("banner", "Banner");
        wide.bounds = Some([-1_000_000_000, 0, 1_000_000_000, 10]);
        let mut edge = toggle(false);
        edge.bounds = Some([i32::MAX, i32::MAX, i32::MAX, i32::MAX]);

        let frame = render_ui_tree(&UiTree { nodes: vec![tall, wide, edge] }, 40, 40);
        // Top edge of the banner spans the canvas; its side edges are off-canvas.
        assert_ne!(frame.get_pixel(25, 0).0, BACKGROUND);
        assert_ne!(frame.get_pixel(25, 10).0, BACKGROUND);
        assert_eq!(frame.get_pixel(25, 5).0, BACKGROUND);
    }

    #[test]
    fn inverted_bounds_draw_nothing() {
        let mut node = UiNode::new("inverted", "Inverted");
        node.bounds = Some([30, 30, 10, 10]);
        node.checked = Some(true);
        let frame = render_ui_tree(&UiTree { nodes: vec![node] }, 40, 40);
        assert!(frame.pixels().all(|p| p.0 == BACKGROUND));
    }

    #[test]
    fn writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_00000.png");
        let frame = render_ui_tree(&UiTree { nodes: vec![toggle(false)] }, 64, 64);
        save_png(&frame, &path).unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!(back.width(), 64);
    }
}
