use crate::db::core::{DesignDB, PlacementStatus};
use crate::db::indices::CellId;
use image::{ImageResult, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

pub fn draw_placement(db: &DesignDB, filename: &str, width: u32, height: u32) -> ImageResult<()> {
    let mut img = RgbImage::from_pixel(width, height, Rgb([20, 20, 20]));

    let die_w = db.die_area.width() as f64;
    let die_h = db.die_area.height() as f64;
    if die_w <= 0.0 || die_h <= 0.0 {
        log::warn!("Empty die area, no placement image written.");
        return Ok(());
    }

    let scale_x = width as f64 / die_w;
    let scale_y = height as f64 / die_h;

    let map = |x: i64, y: i64| {
        (
            (x - db.die_area.min.x) as f64 * scale_x,
            (height as f64 - (y - db.die_area.min.y) as f64 * scale_y),
        )
    };

    let color_cell = Rgb([180, 60, 60]);
    let color_fixed = Rgb([180, 120, 40]);
    let color_diode = Rgb([60, 200, 90]);
    let color_row = Rgb([45, 45, 55]);

    for row in &db.rows {
        let r = row.bbox();
        let (x, y_bot) = map(r.min.x, r.min.y);
        let w = (r.width() as f64 * scale_x).max(1.0);
        let h = (r.height() as f64 * scale_y).max(1.0);
        let rect = ImageRect::at(x as i32, (y_bot - h) as i32).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(&mut img, rect, color_row);
    }

    for i in 0..db.num_cells() {
        let cell = CellId::new(i);
        let data = &db.cells[i];
        if data.status == PlacementStatus::Unplaced {
            continue;
        }
        let bbox = db.cell_bbox(cell);
        let (x, y_bot) = map(bbox.min.x, bbox.min.y);
        let w = (bbox.width() as f64 * scale_x).max(2.0);
        let h = (bbox.height() as f64 * scale_y).max(2.0);
        let rect = ImageRect::at(x as i32, (y_bot - h) as i32).of_size(w as u32, h as u32);

        let color = if data.name.starts_with("ANTENNA_") {
            color_diode
        } else if data.status.is_fixed() {
            color_fixed
        } else {
            color_cell
        };
        draw_filled_rect_mut(&mut img, rect, color);
    }
    img.save(Path::new(filename))
}

/// Writes a row-major grid of utilization ratios as a heat map. Ratios at
/// or above 1.0 saturate to red; row 0 is drawn at the bottom.
pub fn draw_heatmap(
    values: &[f64],
    cols: usize,
    rows: usize,
    filename: &str,
    cell_px: u32,
) -> ImageResult<()> {
    if cols == 0 || rows == 0 || values.len() < cols * rows {
        return Ok(());
    }
    let px = cell_px.max(1);
    let width = cols as u32 * px;
    let height = rows as u32 * px;
    let mut img = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));

    for y in 0..rows {
        for x in 0..cols {
            let v = values[y * cols + x].clamp(0.0, 1.0);
            let color = if v >= 1.0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([(v * 255.0) as u8, ((1.0 - v) * 180.0) as u8, 60])
            };
            let top = height as i32 - ((y as u32 + 1) * px) as i32;
            let rect = ImageRect::at((x as u32 * px) as i32, top).of_size(px, px);
            draw_filled_rect_mut(&mut img, rect, color);
        }
    }
    img.save(Path::new(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heatmap_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heat.png");
        let values = vec![0.0, 0.5, 1.0, 2.0];
        draw_heatmap(&values, 2, 2, path.to_str().unwrap(), 4).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (8, 8));
        // (x=1, y=1) holds 2.0 and sits in the top-right corner.
        assert_eq!(img.get_pixel(7, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn unwritable_heatmap_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("heat.png");
        assert!(draw_heatmap(&[0.5], 1, 1, path.to_str().unwrap(), 4).is_err());
        assert!(!path.exists());
    }
}
