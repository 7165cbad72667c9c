//! Resize planning.
//!
//! Pure integer arithmetic: target sizes are floored and never below 1.

use ipxpress_core::{Edges, Fit, ProcessingSpec, Region};

/// What the resize step must do to a `source`-sized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Size to scale to.
    pub width: u32,
    pub height: u32,
    /// Region of the scaled image to keep (`cover`).
    pub crop: Option<Region>,
    /// Border to add around the scaled image (`contain`).
    pub pad: Option<Edges>,
}

impl ResizePlan {
    /// Final output size after crop or pad.
    pub fn output_size(&self) -> (u32, u32) {
        if let Some(crop) = self.crop {
            return (crop.width, crop.height);
        }
        if let Some(pad) = self.pad {
            return (
                self.width + pad.left + pad.right,
                self.height + pad.top + pad.bottom,
            );
        }
        (self.width, self.height)
    }
}

fn floor_div(value: u32, num: u32, den: u32) -> u32 {
    if den == 0 {
        return 1;
    }
    ((value as u64 * num as u64) / den as u64).clamp(1, u32::MAX as u64) as u32
}

fn scale_to_width((sw, sh): (u32, u32), width: u32) -> (u32, u32) {
    (width.max(1), floor_div(sh, width, sw))
}

fn scale_to_height((sw, sh): (u32, u32), height: u32) -> (u32, u32) {
    (floor_div(sw, height, sh), height.max(1))
}

/// Plan the resize of a `source`-sized image, or `None` when no target size was requested.
pub fn plan_resize(source: (u32, u32), spec: &ProcessingSpec) -> Option<ResizePlan> {
    let (sw, sh) = source;
    let fit = spec.fit.unwrap_or_default();

    let (width, height) = match (spec.width, spec.height) {
        (None, None) => return None,
        (Some(w), None) => scale_to_width(source, w),
        (None, Some(h)) => scale_to_height(source, h),
        (Some(w), Some(h)) => {
            // Compare w/sw against h/sh without floats.
            let width_ratio = w as u64 * sh as u64;
            let height_ratio = h as u64 * sw as u64;
            match fit {
                Fit::Inside | Fit::Contain => {
                    if width_ratio <= height_ratio {
                        scale_to_width(source, w)
                    } else {
                        scale_to_height(source, h)
                    }
                }
                Fit::Cover | Fit::Outside => {
                    if width_ratio >= height_ratio {
                        scale_to_width(source, w)
                    } else {
                        scale_to_height(source, h)
                    }
                }
                Fit::Fill => {
                    if spec.enlarge {
                        (w, h)
                    } else {
                        (w.min(sw).max(1), h.min(sh).max(1))
                    }
                }
            }
        }
    };

    let (width, height) = if !spec.enlarge && fit != Fit::Fill && (width > sw || height > sh) {
        (sw.max(1), sh.max(1))
    } else {
        (width, height)
    };

    let mut plan = ResizePlan {
        width,
        height,
        crop: None,
        pad: None,
    };

    if let (Some(box_w), Some(box_h)) = (spec.width, spec.height) {
        match fit {
            Fit::Cover if width > box_w || height > box_h => {
                let crop_w = width.min(box_w);
                let crop_h = height.min(box_h);
                let (ax, ay) = spec.position.unwrap_or_default().anchor();
                plan.crop = Some(Region {
                    left: ((width - crop_w) as f64 * ax).round() as u32,
                    top: ((height - crop_h) as f64 * ay).round() as u32,
                    width: crop_w,
                    height: crop_h,
                });
            }
            Fit::Contain if width < box_w || height < box_h => {
                let dx = box_w.saturating_sub(width);
                let dy = box_h.saturating_sub(height);
                plan.pad = Some(Edges {
                    top: dy / 2,
                    right: dx - dx / 2,
                    bottom: dy - dy / 2,
                    left: dx / 2,
                });
            }
            _ => {}
        }
    }

    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipxpress_core::Position;

    fn spec(width: Option<u32>, height: Option<u32>) -> ProcessingSpec {
        ProcessingSpec::new("https://img.test/a.png").with_size(width, height)
    }

    fn size(plan: Option<ResizePlan>) -> Option<(u32, u32)> {
        plan.map(|p| p.output_size())
    }

    #[test]
    fn test_no_target_means_no_plan() {
        assert_eq!(plan_resize((1000, 500), &spec(None, None)), None);
    }

    #[test]
    fn test_fit_inside_box() {
        assert_eq!(size(plan_resize((1000, 500), &spec(Some(600), Some(400)))), Some((600, 300)));
        assert_eq!(size(plan_resize((500, 1000), &spec(Some(600), Some(400)))), Some((200, 400)));
    }

    #[test]
    fn test_single_axis() {
        assert_eq!(size(plan_resize((1000, 500), &spec(Some(500), None))), Some((500, 250)));
        assert_eq!(size(plan_resize((1000, 500), &spec(None, Some(100)))), Some((200, 100)));
    }

    #[test]
    fn test_no_enlarge_by_default() {
        assert_eq!(size(plan_resize((100, 50), &spec(Some(400), None))), Some((100, 50)));

        let mut enlarge = spec(Some(400), None);
        enlarge.enlarge = true;
        assert_eq!(size(plan_resize((100, 50), &enlarge)), Some((400, 200)));
    }

    #[test]
    fn test_tiny_results_clamp_to_one() {
        assert_eq!(size(plan_resize((1000, 2), &spec(Some(10), None))), Some((10, 1)));
    }

    #[test]
    fn test_cover_crops_at_position() {
        let mut s = spec(Some(400), Some(400));
        s.fit = Some(Fit::Cover);
        let plan = plan_resize((1000, 500), &s).unwrap();
        assert_eq!((plan.width, plan.height), (800, 400));
        assert_eq!(
            plan.crop,
            Some(Region {
                left: 200,
                top: 0,
                width: 400,
                height: 400
            })
        );

        s.position = Some(Position::Left);
        let plan = plan_resize((1000, 500), &s).unwrap();
        assert_eq!(plan.crop.map(|c| c.left), Some(0));
    }

    #[test]
    fn test_contain_pads_to_box() {
        let mut s = spec(Some(600), Some(400));
        s.fit = Some(Fit::Contain);
        let plan = plan_resize((1000, 500), &s).unwrap();
        assert_eq!((plan.width, plan.height), (600, 300));
        assert_eq!(
            plan.pad,
            Some(Edges {
                top: 50,
                right: 0,
                bottom: 50,
                left: 0
            })
        );
        assert_eq!(plan.output_size(), (600, 400));
    }

    #[test]
    fn test_fill_and_outside() {
        let mut s = spec(Some(300), Some(300));
        s.fit = Some(Fit::Fill);
        assert_eq!(size(plan_resize((1000, 500), &s)), Some((300, 300)));

        s.fit = Some(Fit::Outside);
        assert_eq!(size(plan_resize((1000, 500), &s)), Some((600, 300)));
    }
}
