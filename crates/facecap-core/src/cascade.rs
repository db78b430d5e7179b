//! Haar-feature boosted cascade: OpenCV XML loading, window evaluation,
//! multi-scale scan and hit grouping.
//!
//! The loader understands the "new" cascade format written by
//! `opencv_traincascade` (root `opencv_storage/cascade`), which is what the
//! stock `haarcascade_frontalface_default.xml` ships as. Only upright HAAR
//! features with BOOST stages are supported.

use std::path::Path;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::GrayImage;
use roxmltree::Node;
use thiserror::Error;

use crate::detector::FaceBounds;

/// Similarity tolerance used when merging overlapping hits.
pub const GROUP_EPS: f64 = 0.2;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cascade XML is malformed: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("cascade is missing <{0}>")]
    Missing(&'static str),
    #[error("invalid value in <{field}>: {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
    #[error("scale factor must be greater than 1.0, got {0}")]
    InvalidScaleFactor(f64),
}

#[derive(Debug, Clone, Copy)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f64,
}

#[derive(Debug, Clone)]
struct Feature {
    rects: Vec<WeightedRect>,
}

/// Internal node of a weak classifier tree. Non-positive child indices
/// point into the leaf table (`-child`).
#[derive(Debug, Clone, Copy)]
struct Node4 {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct WeakClassifier {
    nodes: Vec<Node4>,
    leaves: Vec<f64>,
}

impl WeakClassifier {
    fn predict(&self, mut feature_value: impl FnMut(usize) -> f64) -> f64 {
        let mut idx: i32 = 0;
        // Trees only point forward; the bound guards against malformed input.
        for _ in 0..=self.nodes.len() {
            let node = self.nodes[idx as usize];
            idx = if feature_value(node.feature) < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return self.leaves[(-idx) as usize];
            }
        }
        0.0
    }
}

#[derive(Debug, Clone)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// A trained Haar cascade ready for evaluation.
#[derive(Debug, Clone)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<Feature>,
}

impl HaarCascade {
    /// Load a cascade from an OpenCV XML file.
    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        let xml = std::fs::read_to_string(path).map_err(|source| CascadeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cascade = Self::from_xml(&xml)?;
        tracing::info!(
            path = %path.display(),
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            window = ?cascade.window_size(),
            "haar cascade loaded"
        );
        Ok(cascade)
    }

    /// Parse a cascade from OpenCV XML text.
    pub fn from_xml(xml: &str) -> Result<Self, CascadeError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        let cascade = if root.has_tag_name("cascade") {
            root
        } else {
            child(root, "cascade")?
        };

        if let Some(kind) = opt_text(cascade, "stageType") {
            if kind != "BOOST" {
                return Err(CascadeError::Unsupported(format!("stage type {kind}")));
            }
        }
        if let Some(kind) = opt_text(cascade, "featureType") {
            if kind != "HAAR" {
                return Err(CascadeError::Unsupported(format!("feature type {kind}")));
            }
        }

        let window_width: u32 = parse_one(child(cascade, "width")?, "width")?;
        let window_height: u32 = parse_one(child(cascade, "height")?, "height")?;
        if window_width < 3 || window_height < 3 {
            return Err(CascadeError::InvalidValue {
                field: "width",
                value: format!("{window_width}x{window_height}"),
            });
        }

        let features = items(child(cascade, "features")?)
            .map(|n| parse_feature(n, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = items(child(cascade, "stages")?)
            .map(|n| parse_stage(n, features.len()))
            .collect::<Result<Vec<_>, _>>()?;
        if stages.is_empty() {
            return Err(CascadeError::Missing("stages/_"));
        }

        Ok(Self {
            window_width,
            window_height,
            stages,
            features,
        })
    }

    /// Base detection window `(width, height)` the cascade was trained at.
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage on the base-size window at `(x, y)`.
    fn evaluate(&self, ii: &Integral, x: u32, y: u32) -> bool {
        let (ww, wh) = (self.window_width, self.window_height);
        let area = ((ww - 2) * (wh - 2)) as f64;
        let sum = ii.sum(x + 1, y + 1, ww - 2, wh - 2) as f64;
        let sq_sum = ii.sq_sum(x + 1, y + 1, ww - 2, wh - 2) as f64;
        let nf = area * sq_sum - sum * sum;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };

        let feature_value = |idx: usize| -> f64 {
            let raw: f64 = self.features[idx]
                .rects
                .iter()
                .map(|r| r.weight * ii.sum(x + r.x, y + r.y, r.width, r.height) as f64)
                .sum();
            raw / nf
        };

        self.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|wc| wc.predict(&feature_value))
                .sum();
            score >= stage.threshold
        })
    }

    /// Raw (ungrouped) hits over an image pyramid.
    ///
    /// The image is shrunk by `scale_factor` per level while the window stays
    /// at its trained size; hits are mapped back to source coordinates.
    /// Levels whose mapped window is smaller than `min_size` are skipped.
    pub fn scan(
        &self,
        gray: &GrayImage,
        scale_factor: f64,
        min_size: (u32, u32),
    ) -> Result<Vec<FaceBounds>, CascadeError> {
        if !(scale_factor > 1.0) {
            return Err(CascadeError::InvalidScaleFactor(scale_factor));
        }
        let (ww, wh) = self.window_size();
        let (w, h) = gray.dimensions();
        let mut hits = Vec::new();
        let mut factor = 1.0f64;

        loop {
            let scaled_w = (w as f64 / factor).round() as u32;
            let scaled_h = (h as f64 / factor).round() as u32;
            if scaled_w < ww || scaled_h < wh {
                break;
            }
            let win_w = (ww as f64 * factor).round() as u32;
            let win_h = (wh as f64 * factor).round() as u32;
            if win_w < min_size.0 || win_h < min_size.1 {
                factor *= scale_factor;
                continue;
            }

            let resized;
            let level = if factor == 1.0 {
                gray
            } else {
                resized = imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle);
                &resized
            };
            let ii = Integral::new(level);
            let step = if factor > 2.0 { 1 } else { 2 };

            let before = hits.len();
            // The last window position is `scaled - window`, inclusive.
            for y in (0..=scaled_h - wh).step_by(step) {
                for x in (0..=scaled_w - ww).step_by(step) {
                    if self.evaluate(&ii, x, y) {
                        hits.push(FaceBounds {
                            x: (x as f64 * factor).round() as u32,
                            y: (y as f64 * factor).round() as u32,
                            width: win_w,
                            height: win_h,
                        });
                    }
                }
            }
            tracing::trace!(factor, hits = hits.len() - before, "cascade level scanned");

            factor *= scale_factor;
        }

        Ok(hits)
    }
}

/// Summed-area tables for pixel values and their squares.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq = vec![0u64; stride * (h + 1)];
        let raw = gray.as_raw();
        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = raw[y * w + x] as u64;
                row_sum += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row_sum;
                sq[i] = sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn rect(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let a = table[y * stride + x];
        let b = table[y * stride + x + w];
        let c = table[(y + h) * stride + x];
        let d = table[(y + h) * stride + x + w];
        (a + d) - (b + c)
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::rect(&self.sum, self.stride, x, y, w, h)
    }

    fn sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::rect(&self.sq, self.stride, x, y, w, h)
    }
}

/// Merge overlapping hits into detections.
///
/// Hits are partitioned into classes of mutually similar rectangles, each
/// class is averaged, and classes with `min_neighbors` or fewer members are
/// dropped. A surviving rectangle that sits inside a better-supported one is
/// dropped as well. `min_neighbors == 0` returns the hits unchanged.
pub fn group_rectangles(hits: &[FaceBounds], min_neighbors: u32, eps: f64) -> Vec<FaceBounds> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let n = hits.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&hits[i], &hits[j], eps) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // Per-class coordinate sums and member counts, in first-seen order.
    let mut class_of_root = vec![usize::MAX; n];
    let mut sums: Vec<[u64; 4]> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    for (i, r) in hits.iter().enumerate() {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = sums.len();
            sums.push([0; 4]);
            counts.push(0);
        }
        let c = class_of_root[root];
        sums[c][0] += r.x as u64;
        sums[c][1] += r.y as u64;
        sums[c][2] += r.width as u64;
        sums[c][3] += r.height as u64;
        counts[c] += 1;
    }

    let averaged: Vec<FaceBounds> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &count)| {
            let k = 1.0 / count as f64;
            FaceBounds {
                x: (s[0] as f64 * k).round() as u32,
                y: (s[1] as f64 * k).round() as u32,
                width: (s[2] as f64 * k).round() as u32,
                height: (s[3] as f64 * k).round() as u32,
            }
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if i == j || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i64;
            let dy = (r2.height as f64 * eps).round() as i64;
            let (x1, y1, w1, h1) = (r1.x as i64, r1.y as i64, r1.width as i64, r1.height as i64);
            let (x2, y2, w2, h2) = (r2.x as i64, r2.y as i64, r2.width as i64, r2.height as i64);
            x1 >= x2 - dx
                && y1 >= y2 - dy
                && x1 + w1 <= x2 + w2 + dx
                && y1 + h1 <= y2 + h2 + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            grouped.push(*r1);
        }
    }
    grouped
}

fn similar(a: &FaceBounds, b: &FaceBounds, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64) * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

// --- XML helpers ---

fn child<'a, 'i>(node: Node<'a, 'i>, name: &'static str) -> Result<Node<'a, 'i>, CascadeError> {
    node.children()
        .find(|c| c.has_tag_name(name))
        .ok_or(CascadeError::Missing(name))
}

fn opt_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.has_tag_name(name))
        .and_then(|c| c.text())
        .map(str::trim)
}

/// Element children named `_` (OpenCV's sequence item tag).
fn items<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|c| c.has_tag_name("_"))
}

fn parse_list<T: FromStr>(node: Node, field: &'static str) -> Result<Vec<T>, CascadeError> {
    let text = node.text().unwrap_or("");
    text.split_ascii_whitespace()
        .map(|tok| {
            tok.parse().map_err(|_| CascadeError::InvalidValue {
                field,
                value: tok.to_string(),
            })
        })
        .collect()
}

fn parse_one<T: FromStr>(node: Node, field: &'static str) -> Result<T, CascadeError> {
    let text = node.text().unwrap_or("").trim();
    text.parse().map_err(|_| CascadeError::InvalidValue {
        field,
        value: text.to_string(),
    })
}

fn parse_feature(node: Node, ww: u32, wh: u32) -> Result<Feature, CascadeError> {
    if let Some(tilted) = opt_text(node, "tilted") {
        if tilted != "0" {
            return Err(CascadeError::Unsupported("tilted haar features".into()));
        }
    }
    let rects = items(child(node, "rects")?)
        .map(|r| {
            let vals: Vec<f64> = parse_list(r, "rects")?;
            if vals.len() != 5 {
                return Err(CascadeError::InvalidValue {
                    field: "rects",
                    value: r.text().unwrap_or("").trim().to_string(),
                });
            }
            let rect = WeightedRect {
                x: vals[0] as u32,
                y: vals[1] as u32,
                width: vals[2] as u32,
                height: vals[3] as u32,
                weight: vals[4],
            };
            if vals[..4].iter().any(|v| *v < 0.0)
                || rect.x + rect.width > ww
                || rect.y + rect.height > wh
            {
                return Err(CascadeError::InvalidValue {
                    field: "rects",
                    value: format!("{vals:?} outside {ww}x{wh} window"),
                });
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rects.is_empty() {
        return Err(CascadeError::Missing("rects/_"));
    }
    Ok(Feature { rects })
}

fn parse_stage(node: Node, feature_count: usize) -> Result<Stage, CascadeError> {
    let threshold: f64 = parse_one(child(node, "stageThreshold")?, "stageThreshold")?;
    let classifiers = items(child(node, "weakClassifiers")?)
        .map(|wc| parse_weak_classifier(wc, feature_count))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node, feature_count: usize) -> Result<WeakClassifier, CascadeError> {
    let raw: Vec<f64> = parse_list(child(node, "internalNodes")?, "internalNodes")?;
    let leaves: Vec<f64> = parse_list(child(node, "leafValues")?, "leafValues")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(CascadeError::Unsupported(format!(
            "internalNodes with {} values (categorical splits are not supported)",
            raw.len()
        )));
    }

    let nodes: Vec<Node4> = raw
        .chunks_exact(4)
        .map(|c| Node4 {
            left: c[0] as i32,
            right: c[1] as i32,
            feature: c[2] as usize,
            threshold: c[3],
        })
        .collect();

    for n in &nodes {
        let bad_child = |idx: i32| {
            if idx > 0 {
                idx as usize >= nodes.len()
            } else {
                (-idx) as usize >= leaves.len()
            }
        };
        if n.feature >= feature_count || bad_child(n.left) || bad_child(n.right) {
            return Err(CascadeError::InvalidValue {
                field: "internalNodes",
                value: format!("{} {} {} {}", n.left, n.right, n.feature, n.threshold),
            });
        }
    }

    Ok(WeakClassifier { nodes, leaves })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Luma;

    /// One stump on an 8x8 window that fires when the upper half is brighter
    /// than the lower half.
    pub(crate) const EDGE_CASCADE: &str = include_str!("../tests/fixtures/edge_cascade.xml");

    fn split_image(top: u8, bottom: u8) -> GrayImage {
        GrayImage::from_fn(40, 40, |_, y| if y < 20 { Luma([top]) } else { Luma([bottom]) })
    }

    #[test]
    fn parses_synthetic_cascade() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        assert_eq!(cascade.window_size(), (8, 8));
        assert_eq!(cascade.stage_count(), 1);
    }

    #[test]
    fn fires_on_bright_over_dark_edge() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let hits = cascade.scan(&split_image(200, 20), 1.3, (0, 0)).unwrap();
        assert!(!hits.is_empty());
        // Every hit overlaps the band around the edge at row 20; coarser
        // pyramid levels blur the edge across a couple of rows.
        for hit in &hits {
            assert!(hit.y <= 22 && hit.y + hit.height >= 18, "{hit:?}");
        }
    }

    #[test]
    fn ignores_flat_and_inverted_images() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let flat = GrayImage::from_pixel(40, 40, Luma([120]));
        assert!(cascade.scan(&flat, 1.3, (0, 0)).unwrap().is_empty());
        assert!(cascade
            .scan(&split_image(20, 200), 1.3, (0, 0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn min_size_skips_small_levels() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let hits = cascade.scan(&split_image(200, 20), 1.3, (12, 12)).unwrap();
        assert!(hits.iter().all(|h| h.width >= 12 && h.height >= 12));
    }

    #[test]
    fn scans_last_window_row() {
        // Bright rows 2..=5 over dark: only the window at y = 2, the last
        // position in a 10-row image, sees the edge in its centre.
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let band = GrayImage::from_fn(9, 10, |_, y| {
            if (2..=5).contains(&y) {
                Luma([200])
            } else {
                Luma([20])
            }
        });
        let hits = cascade.scan(&band, 1.3, (0, 0)).unwrap();
        assert_eq!(hits, vec![FaceBounds { x: 0, y: 2, width: 8, height: 8 }]);
    }

    #[test]
    fn image_equal_to_window_is_scanned_once() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let edge = GrayImage::from_fn(8, 8, |_, y| {
            if y < 4 {
                Luma([200])
            } else {
                Luma([20])
            }
        });
        assert_eq!(cascade.scan(&edge, 1.3, (0, 0)).unwrap().len(), 1);
    }

    #[test]
    fn image_smaller_than_window_has_no_hits() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let tiny = GrayImage::from_pixel(6, 6, Luma([255]));
        assert!(cascade.scan(&tiny, 1.3, (0, 0)).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_increasing_scale_factor() {
        let cascade = HaarCascade::from_xml(EDGE_CASCADE).unwrap();
        let err = cascade
            .scan(&split_image(200, 20), 1.0, (0, 0))
            .unwrap_err();
        assert!(matches!(err, CascadeError::InvalidScaleFactor(_)));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            HaarCascade::from_xml("<opencv_storage>"),
            Err(CascadeError::Xml(_))
        ));
        let no_features = "<opencv_storage><cascade>\
            <width>8</width><height>8</height>\
            </cascade></opencv_storage>";
        assert!(matches!(
            HaarCascade::from_xml(no_features),
            Err(CascadeError::Missing("features"))
        ));
        let bad_number = EDGE_CASCADE.replace("<stageThreshold>0.", "<stageThreshold>zero");
        assert!(matches!(
            HaarCascade::from_xml(&bad_number),
            Err(CascadeError::InvalidValue { field: "stageThreshold", .. })
        ));
    }

    #[test]
    fn rejects_tilted_features_and_lbp() {
        let tilted = EDGE_CASCADE.replace("</rects></_>", "</rects><tilted>1</tilted></_>");
        assert!(matches!(
            HaarCascade::from_xml(&tilted),
            Err(CascadeError::Unsupported(_))
        ));
        let lbp = EDGE_CASCADE.replace("<featureType>HAAR", "<featureType>LBP");
        assert!(matches!(
            HaarCascade::from_xml(&lbp),
            Err(CascadeError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_feature_outside_window() {
        let wide = EDGE_CASCADE.replace("0 0 8 4 2.", "4 0 8 4 2.");
        assert!(matches!(
            HaarCascade::from_xml(&wide),
            Err(CascadeError::InvalidValue { field: "rects", .. })
        ));
    }

    #[test]
    fn rejects_dangling_feature_index() {
        let dangling = EDGE_CASCADE.replace("0 -1 0 1.0000000149011612e-01", "0 -1 3 0.1");
        assert!(matches!(
            HaarCascade::from_xml(&dangling),
            Err(CascadeError::InvalidValue { field: "internalNodes", .. })
        ));
    }

    #[test]
    fn evaluates_depth_two_tree() {
        // Root splits on feature 0; its right child is a second node.
        let tree = WeakClassifier {
            nodes: vec![
                Node4 {
                    left: 0,
                    right: 1,
                    feature: 0,
                    threshold: 0.5,
                },
                Node4 {
                    left: -1,
                    right: -2,
                    feature: 1,
                    threshold: 0.0,
                },
            ],
            leaves: vec![10.0, 20.0, 30.0],
        };
        assert_eq!(tree.predict(|_| 0.0), 10.0);
        assert_eq!(tree.predict(|f| if f == 0 { 1.0 } else { -1.0 }), 20.0);
        assert_eq!(tree.predict(|_| 1.0), 30.0);
    }

    fn rect(x: u32, y: u32, size: u32) -> FaceBounds {
        FaceBounds {
            x,
            y,
            width: size,
            height: size,
        }
    }

    #[test]
    fn grouping_merges_dense_cluster() {
        let hits: Vec<FaceBounds> = (0..7).map(|i| rect(100 + i, 50 + i % 2, 40)).collect();
        let grouped = group_rectangles(&hits, 5, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0], rect(103, 50, 40));
    }

    #[test]
    fn grouping_drops_sparse_clusters() {
        let hits = vec![rect(10, 10, 40), rect(11, 10, 40), rect(300, 300, 40)];
        assert!(group_rectangles(&hits, 5, GROUP_EPS).is_empty());
        assert_eq!(group_rectangles(&hits, 1, GROUP_EPS), vec![rect(11, 10, 40)]);
    }

    #[test]
    fn grouping_with_zero_neighbors_keeps_raw_hits() {
        let hits = vec![rect(10, 10, 40), rect(11, 10, 40)];
        assert_eq!(group_rectangles(&hits, 0, GROUP_EPS), hits);
    }

    #[test]
    fn grouping_drops_rect_nested_in_stronger_one() {
        let mut hits: Vec<FaceBounds> = (0..8).map(|_| rect(100, 100, 100)).collect();
        hits.extend((0..2).map(|_| rect(120, 120, 40)));
        let grouped = group_rectangles(&hits, 1, GROUP_EPS);
        assert_eq!(grouped, vec![rect(100, 100, 100)]);
    }
}
