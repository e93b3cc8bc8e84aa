use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::models::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LINE_WIDTH: u32 = 3;

/// Draw a hollow box around each detection on an RGB copy of the frame, for
/// attachment to outgoing notifications.
///
/// Panics if a detection box does not fit the image; boxes are unions of tile
/// rects derived from the same image, so a mismatch is a contract violation.
pub fn annotate_detections(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut annotated = image.to_rgb8();
    for detection in detections {
        assert!(
            detection.x + detection.width <= annotated.width()
                && detection.y + detection.height <= annotated.height(),
            "detection {:?} outside {}x{} image",
            detection,
            annotated.width(),
            annotated.height()
        );
        for inset in 0..LINE_WIDTH {
            if detection.width > 2 * inset && detection.height > 2 * inset {
                let rect = Rect::at((detection.x + inset) as i32, (detection.y + inset) as i32)
                    .of_size(detection.width - 2 * inset, detection.height - 2 * inset);
                draw_hollow_rect_mut(&mut annotated, rect, BOX_COLOR);
            }
        }
    }
    annotated
}
