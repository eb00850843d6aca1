//! Decoding of the raw YOLO output tensor and greedy per-class
//! non-maximum suppression.

use crate::error::{DetectorError, Result};
use crate::pipeline::detection::{Detection, Detections};
use crate::pipeline::labels::LabelTable;

/// Rows before the class scores: x_center, y_center, width, height.
pub const BOX_ROWS: usize = 4;

/// Row-major `[attributes x anchors]` output of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
    data: Vec<f32>,
    attributes: usize,
    anchors: usize,
}

impl RawTensor {
    pub fn new(data: Vec<f32>, attributes: usize, anchors: usize) -> Result<Self> {
        if data.len() != attributes * anchors {
            return Err(DetectorError::InvalidInput(format!(
                "tensor holds {} values, expected {}x{}",
                data.len(),
                attributes,
                anchors
            )));
        }
        Ok(Self {
            data,
            attributes,
            anchors,
        })
    }

    pub fn attributes(&self) -> usize {
        self.attributes
    }

    pub fn anchors(&self) -> usize {
        self.anchors
    }

    pub fn num_classes(&self) -> usize {
        self.attributes.saturating_sub(BOX_ROWS)
    }

    pub fn get(&self, row: usize, anchor: usize) -> f32 {
        self.data[row * self.anchors + anchor]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessParams {
    /// Side of the square model input, in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Applied to width and height only. Empirical correction for this
    /// model over-predicting box extents.
    pub box_shrink: f32,
}

impl Default for PostProcessParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.50,
            iou_threshold: 0.45,
            box_shrink: 0.85,
        }
    }
}

/// Turns every anchor whose best class score exceeds the confidence
/// threshold into a detection in original image coordinates.
pub fn decode(
    tensor: &RawTensor,
    image_width: u32,
    image_height: u32,
    labels: &LabelTable,
    params: &PostProcessParams,
) -> Detections {
    if tensor.attributes() <= BOX_ROWS {
        return Detections::new();
    }

    let input_size = params.input_size as f32;
    let scale_x = image_width as f32 / input_size;
    let scale_y = image_height as f32 / input_size;

    let mut detections = Detections::new();
    for anchor in 0..tensor.anchors() {
        let w_norm = tensor.get(2, anchor);
        let h_norm = tensor.get(3, anchor);

        let mut max_confidence = 0f32;
        let mut best_class = None;
        for class_id in 0..tensor.num_classes() {
            let score = tensor.get(BOX_ROWS + class_id, anchor);
            if score > max_confidence {
                max_confidence = score;
                best_class = Some(class_id);
            }
        }

        let Some(class_id) = best_class else { continue };
        if !(max_confidence > params.confidence_threshold && w_norm > 0.0 && h_norm > 0.0) {
            continue;
        }

        let x = tensor.get(0, anchor) * input_size * scale_x;
        let y = tensor.get(1, anchor) * input_size * scale_y;
        let width = w_norm * input_size * scale_x * params.box_shrink;
        let height = h_norm * input_size * scale_y * params.box_shrink;

        tracing::trace!(class_id, confidence = max_confidence, x, y, width, height, "decoded anchor {anchor}");
        detections.push(Detection {
            class_id,
            class_name: labels.name_for(class_id).into_owned(),
            confidence: max_confidence,
            x,
            y,
            width,
            height,
        });
    }
    detections
}

/// Intersection over union of two center+size boxes.
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.left().max(b.left());
    let y1 = a.top().max(b.top());
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Greedy suppression. Only detections of the same class suppress each
/// other; the result is ordered by descending confidence.
pub fn nms(mut detections: Detections, iou_threshold: f32) -> Detections {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = Detections::new();
    'outer: for candidate in detections {
        for best in kept.iter() {
            if best.class_id == candidate.class_id && iou(best, &candidate) > iou_threshold {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }
    kept
}

/// Decode and suppress. An absent tensor (no model loaded) yields no
/// detections.
pub fn process_output(
    tensor: Option<&RawTensor>,
    image_width: u32,
    image_height: u32,
    labels: &LabelTable,
    params: &PostProcessParams,
) -> Detections {
    let Some(tensor) = tensor else {
        return Detections::new();
    };
    let decoded = decode(tensor, image_width, image_height, labels, params);
    tracing::debug!(candidates = decoded.len(), anchors = tensor.anchors(), "decoded output");
    nms(decoded, params.iou_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const CLASSES: usize = 80;

    struct Anchor {
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        class_id: usize,
        score: f32,
    }

    fn tensor_from(anchors: &[Anchor]) -> RawTensor {
        let n = anchors.len();
        let attributes = BOX_ROWS + CLASSES;
        let mut data = vec![0f32; attributes * n];
        for (i, a) in anchors.iter().enumerate() {
            data[i] = a.cx;
            data[n + i] = a.cy;
            data[2 * n + i] = a.w;
            data[3 * n + i] = a.h;
            data[(BOX_ROWS + a.class_id) * n + i] = a.score;
        }
        RawTensor::new(data, attributes, n).unwrap()
    }

    fn det(class_id: usize, confidence: f32, x: f32, y: f32, width: f32, height: f32) -> Detection {
        Detection {
            class_id,
            class_name: format!("class_{}", class_id),
            confidence,
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(RawTensor::new(vec![0.0; 10], 84, 1).is_err());
    }

    #[test]
    fn test_single_anchor_rescaled() {
        let tensor = tensor_from(&[Anchor { cx: 0.5, cy: 0.5, w: 0.2, h: 0.2, class_id: 0, score: 0.9 }]);
        let labels = LabelTable::from_names(["person"]);
        let dets = process_output(Some(&tensor), 1280, 960, &labels, &PostProcessParams::default());
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!(d.class_name, "person");
        assert_eq!(d.class_id, 0);
        assert!((d.confidence - 0.9).abs() < 1e-6);
        assert!((d.x - 640.0).abs() < 1e-3);
        assert!((d.y - 480.0).abs() < 1e-3);
        assert!((d.width - 217.6).abs() < 1e-3);
        assert!((d.height - 163.2).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let tensor = tensor_from(&[
            Anchor { cx: 0.5, cy: 0.5, w: 0.2, h: 0.2, class_id: 1, score: 0.5 },
            Anchor { cx: 0.5, cy: 0.5, w: 0.2, h: 0.2, class_id: 1, score: 0.3 },
        ]);
        let dets = decode(&tensor, 640, 640, &LabelTable::default(), &PostProcessParams::default());
        assert!(dets.is_empty());
    }

    #[test]
    fn test_degenerate_size_discarded() {
        let tensor = tensor_from(&[
            Anchor { cx: 0.5, cy: 0.5, w: 0.0, h: 0.2, class_id: 0, score: 0.99 },
            Anchor { cx: 0.5, cy: 0.5, w: 0.2, h: -0.1, class_id: 0, score: 0.99 },
            Anchor { cx: 0.5, cy: 0.5, w: f32::NAN, h: 0.2, class_id: 0, score: 0.99 },
        ]);
        let dets = decode(&tensor, 640, 640, &LabelTable::default(), &PostProcessParams::default());
        assert!(dets.is_empty());
    }

    #[test]
    fn test_argmax_and_placeholder_name() {
        let n = 1;
        let attributes = BOX_ROWS + CLASSES;
        let mut data = vec![0f32; attributes];
        data[0] = 0.5;
        data[1] = 0.5;
        data[2] = 0.1;
        data[3] = 0.1;
        data[BOX_ROWS + 3] = 0.6;
        data[BOX_ROWS + 42] = 0.8;
        let tensor = RawTensor::new(data, attributes, n).unwrap();
        let labels = LabelTable::from_names(["person", "bicycle"]);
        let dets = decode(&tensor, 640, 640, &labels, &PostProcessParams::default());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 42);
        assert_eq!(dets[0].class_name, "class_42");
    }

    #[test]
    fn test_empty_inputs() {
        let params = PostProcessParams::default();
        let labels = LabelTable::default();
        assert!(process_output(None, 640, 640, &labels, &params).is_empty());

        let empty = RawTensor::new(Vec::new(), BOX_ROWS + CLASSES, 0).unwrap();
        assert!(process_output(Some(&empty), 640, 640, &labels, &params).is_empty());

        let low = tensor_from(&[Anchor { cx: 0.5, cy: 0.5, w: 0.2, h: 0.2, class_id: 0, score: 0.1 }]);
        assert!(process_output(Some(&low), 640, 640, &labels, &params).is_empty());
    }

    #[test]
    fn test_iou_self_and_disjoint() {
        let a = det(0, 0.9, 100.0, 100.0, 50.0, 30.0);
        let b = det(0, 0.9, 300.0, 300.0, 50.0, 30.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &b), 0.0);

        let touching = det(0, 0.9, 150.0, 100.0, 50.0, 30.0);
        assert_eq!(iou(&a, &touching), 0.0);

        let empty = det(0, 0.9, 10.0, 10.0, 0.0, 0.0);
        assert_eq!(iou(&empty, &empty), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // 10x10 boxes shifted by 5 on x: intersection 50, union 150
        let a = det(0, 0.9, 5.0, 5.0, 10.0, 10.0);
        let b = det(0, 0.9, 10.0, 5.0, 10.0, 10.0);
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_same_class_overlap_suppressed() {
        // intersection 75, union 125 -> iou 0.6
        let strong = det(2, 0.9, 5.0, 5.0, 10.0, 10.0);
        let weak = det(2, 0.7, 7.5, 5.0, 10.0, 10.0);
        assert!((iou(&strong, &weak) - 0.6).abs() < 1e-6);

        let kept = nms(vec![weak, strong.clone()], 0.45);
        assert_eq!(kept, vec![strong]);
    }

    #[test]
    fn test_cross_class_not_suppressed() {
        let person = det(0, 0.8, 50.0, 50.0, 20.0, 20.0);
        let dog = det(16, 0.9, 50.5, 50.0, 20.0, 20.0);
        assert!(iou(&person, &dog) > 0.9);

        let kept = nms(vec![person.clone(), dog.clone()], 0.45);
        assert_eq!(kept, vec![dog, person]);
    }

    #[test]
    fn test_low_overlap_kept() {
        let a = det(0, 0.9, 5.0, 5.0, 10.0, 10.0);
        let b = det(0, 0.8, 10.0, 5.0, 10.0, 10.0);
        let kept = nms(vec![a, b], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_with_nan_confidence() {
        let input: Detections = (0..40)
            .map(|i| {
                let confidence = if i % 3 == 0 { f32::NAN } else { i as f32 / 40.0 };
                det(0, confidence, i as f32 * 3.0, 10.0, 20.0, 20.0)
            })
            .collect();
        let kept = nms(input, 0.45);
        assert!(!kept.is_empty());
        let finite: Vec<f32> = kept.iter().map(|d| d.confidence).filter(|c| !c.is_nan()).collect();
        for pair in finite.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert_eq!(nms(kept.clone(), 0.45).len(), kept.len());
    }

    fn random_detections(rng: &mut impl Rng, count: usize) -> Detections {
        (0..count)
            .map(|_| {
                det(
                    rng.gen_range(0..3),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..200.0),
                    rng.gen_range(0.0..200.0),
                    rng.gen_range(1.0..80.0),
                    rng.gen_range(1.0..80.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_nms_properties_random() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let threshold = 0.45;
        for _ in 0..50 {
            let input = random_detections(&mut rng, 60);
            let kept = nms(input.clone(), threshold);

            assert!(kept.len() <= input.len());
            for pair in kept.windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence);
            }
            for (i, a) in kept.iter().enumerate() {
                for b in kept.iter().skip(i + 1) {
                    if a.class_id == b.class_id {
                        assert!(iou(a, b) <= threshold);
                    }
                }
            }

            assert_eq!(nms(kept.clone(), threshold), kept);
        }
    }

    #[test]
    fn test_decode_respects_threshold_random() {
        let mut rng = StdRng::seed_from_u64(42);
        let params = PostProcessParams::default();
        let anchors: Vec<Anchor> = (0..200)
            .map(|_| Anchor {
                cx: rng.gen_range(0.0..1.0),
                cy: rng.gen_range(0.0..1.0),
                w: rng.gen_range(-0.1..0.5),
                h: rng.gen_range(-0.1..0.5),
                class_id: rng.gen_range(0..CLASSES),
                score: rng.gen_range(0.0..1.0),
            })
            .collect();
        let tensor = tensor_from(&anchors);
        let dets = decode(&tensor, 640, 640, &LabelTable::default(), &params);

        let expected = anchors
            .iter()
            .filter(|a| a.score > params.confidence_threshold && a.w > 0.0 && a.h > 0.0)
            .count();
        assert_eq!(dets.len(), expected);
        assert!(dets.iter().all(|d| d.confidence > params.confidence_threshold));
        assert!(dets.iter().all(|d| d.width > 0.0 && d.height > 0.0));
    }
}
