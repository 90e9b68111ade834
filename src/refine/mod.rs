mod overlay;
mod union_find;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::Rect;
use crate::ocr::TextBox;
use crate::settings::RefineSettings;

use union_find::UnionFind;

pub use overlay::{render_overlay, write_overlay};

/// Words sharing at least this much height belong to the same text line.
const SAME_LINE_OVERLAP: f32 = 0.5;

/// A bubble-level text region built from one or more OCR fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedRegion {
    /// 1-based position in reading order.
    pub index: usize,
    /// `union` grown by the padding and clamped to the image.
    pub bounds: Rect,
    /// Smallest rectangle covering every fragment.
    pub union: Rect,
    pub text: String,
    pub fragments: Vec<TextBox>,
}

impl RefinedRegion {
    /// The region seen as a single OCR fragment. Refining these again yields
    /// the same regions.
    pub fn as_text_box(&self) -> TextBox {
        let conf = if self.fragments.is_empty() {
            0.0
        } else {
            self.fragments.iter().map(|fragment| fragment.conf).sum::<f32>()
                / self.fragments.len() as f32
        };
        TextBox::new(self.text.clone(), self.union, conf)
    }
}

/// Refiner output for one image, as stored between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<RefinedRegion>,
}

#[derive(Debug, Clone)]
pub struct Refiner {
    padding: u32,
    cluster_distance: Option<f32>,
    vertical_weight: f32,
    horizontal_weight: f32,
    max_regions: Option<usize>,
}

impl Refiner {
    pub fn new(settings: &RefineSettings) -> Self {
        Self {
            padding: settings.padding,
            cluster_distance: settings.cluster_distance,
            vertical_weight: settings.vertical_weight,
            horizontal_weight: settings.horizontal_weight,
            max_regions: settings.max_regions,
        }
    }

    pub fn refine(&self, boxes: &[TextBox], width: u32, height: u32) -> Vec<RefinedRegion> {
        if boxes.is_empty() {
            return Vec::new();
        }

        let mut groups: Vec<Vec<usize>> = (0..boxes.len()).map(|idx| vec![idx]).collect();
        let mut round = 0;
        loop {
            round += 1;
            let rects = groups
                .iter()
                .map(|group| union_of(boxes, group))
                .collect::<Vec<_>>();
            let mut sets = UnionFind::new(rects.len());
            for a in 0..rects.len() {
                for b in (a + 1)..rects.len() {
                    if self.are_neighbours(&rects[a], &rects[b]) {
                        sets.union(a, b);
                    }
                }
            }
            let merged = sets
                .components()
                .into_iter()
                .map(|component| {
                    let mut members = component
                        .into_iter()
                        .flat_map(|slot| groups[slot].iter().copied())
                        .collect::<Vec<_>>();
                    members.sort_unstable();
                    members
                })
                .collect::<Vec<_>>();
            debug!(
                "refine round {}: {} group(s) -> {}",
                round,
                groups.len(),
                merged.len()
            );
            let settled = merged.len() == groups.len();
            groups = merged;
            if settled {
                break;
            }
        }

        if let Some(limit) = self.max_regions {
            if groups.len() > limit {
                groups.sort_by(|a, b| union_of(boxes, b).area().cmp(&union_of(boxes, a).area()));
                groups.truncate(limit);
                debug!("kept the {} largest region(s)", limit);
            }
        }

        let mut regions = groups
            .iter()
            .map(|group| {
                let fragments = reading_order(group.iter().map(|&idx| boxes[idx].clone()).collect());
                let union = union_of(boxes, group);
                let text = fragments
                    .iter()
                    .map(|fragment| fragment.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                RefinedRegion {
                    index: 0,
                    bounds: union.expand(self.padding).clamp_to(width, height),
                    union,
                    text,
                    fragments,
                }
            })
            .collect::<Vec<_>>();
        regions.sort_by_key(|region| (region.union.y, region.union.x));
        for (idx, region) in regions.iter_mut().enumerate() {
            region.index = idx + 1;
        }

        info!(
            "refined {} fragment(s) into {} region(s)",
            boxes.len(),
            regions.len()
        );
        regions
    }

    fn are_neighbours(&self, a: &Rect, b: &Rect) -> bool {
        if a.expand(self.padding).intersects(&b.expand(self.padding)) {
            return true;
        }
        match self.cluster_distance {
            Some(limit) => {
                let (ax, ay) = a.center();
                let (bx, by) = b.center();
                let dx = (ax - bx) * self.horizontal_weight;
                let dy = (ay - by) * self.vertical_weight;
                (dx * dx + dy * dy).sqrt() <= limit
            }
            None => false,
        }
    }
}

fn union_of(boxes: &[TextBox], members: &[usize]) -> Rect {
    let mut iter = members.iter().map(|&idx| boxes[idx].bbox);
    let first = iter.next().unwrap_or(Rect::new(0, 0, 0, 0));
    iter.fold(first, |acc, rect| acc.union(&rect))
}

/// Top-to-bottom by line, left-to-right within a line.
fn reading_order(mut fragments: Vec<TextBox>) -> Vec<TextBox> {
    fragments.sort_by_key(|fragment| (fragment.bbox.y, fragment.bbox.x));
    let mut lines: Vec<(Rect, Vec<TextBox>)> = Vec::new();
    for fragment in fragments {
        match lines
            .iter_mut()
            .find(|(rect, _)| rect.vertical_overlap_ratio(&fragment.bbox) >= SAME_LINE_OVERLAP)
        {
            Some((rect, words)) => {
                *rect = rect.union(&fragment.bbox);
                words.push(fragment);
            }
            None => lines.push((fragment.bbox, vec![fragment])),
        }
    }
    lines
        .into_iter()
        .flat_map(|(_, mut words)| {
            words.sort_by_key(|word| word.bbox.x);
            words
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refiner(padding: u32) -> Refiner {
        Refiner::new(&RefineSettings {
            padding,
            ..RefineSettings::default()
        })
    }

    fn word(text: &str, x: u32, y: u32, w: u32, h: u32) -> TextBox {
        TextBox::new(text, Rect::new(x, y, w, h), 90.0)
    }

    fn summary(regions: &[RefinedRegion]) -> Vec<(usize, Rect, Rect, String)> {
        regions
            .iter()
            .map(|region| (region.index, region.bounds, region.union, region.text.clone()))
            .collect()
    }

    #[test]
    fn overlapping_words_become_one_region() {
        let boxes = vec![
            word("world", 62, 20, 50, 20),
            word("Hello", 10, 21, 50, 20),
        ];
        let regions = refiner(10).refine(&boxes, 200, 100);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.index, 1);
        assert_eq!(region.union, Rect::new(10, 20, 102, 21));
        assert_eq!(region.bounds, Rect::new(0, 10, 122, 41));
        assert_eq!(region.text, "Hello world");
    }

    #[test]
    fn distant_words_stay_apart_in_reading_order() {
        let boxes = vec![
            word("abajo", 20, 150, 40, 20),
            word("arriba", 100, 10, 40, 20),
        ];
        let regions = refiner(10).refine(&boxes, 300, 300);
        assert_eq!(
            summary(&regions),
            vec![
                (
                    1,
                    Rect::new(90, 0, 60, 40),
                    Rect::new(100, 10, 40, 20),
                    "arriba".to_string()
                ),
                (
                    2,
                    Rect::new(10, 140, 60, 40),
                    Rect::new(20, 150, 40, 20),
                    "abajo".to_string()
                ),
            ]
        );
    }

    #[test]
    fn merged_unions_are_merged_again() {
        // a and b touch; their union reaches c, which neither reaches alone.
        let boxes = vec![
            word("a", 0, 0, 10, 100),
            word("b", 10, 0, 100, 10),
            word("c", 100, 40, 10, 10),
        ];
        let regions = refiner(0).refine(&boxes, 200, 200);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].union, Rect::new(0, 0, 110, 100));
    }

    #[test]
    fn every_padded_overlap_lands_in_one_region() {
        let boxes = vec![
            word("uno", 10, 10, 30, 12),
            word("dos", 45, 12, 30, 12),
            word("tres", 200, 10, 30, 12),
            word("cuatro", 12, 30, 40, 12),
            word("cinco", 205, 150, 30, 12),
        ];
        let refiner = refiner(4);
        let regions = refiner.refine(&boxes, 300, 200);
        let region_of = |text: &str| {
            regions
                .iter()
                .position(|region| region.fragments.iter().any(|f| f.text == text))
                .expect("fragment kept")
        };
        for a in &boxes {
            for b in &boxes {
                if a.bbox.expand(4).intersects(&b.bbox.expand(4)) {
                    assert_eq!(region_of(&a.text), region_of(&b.text));
                }
            }
        }
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].text, "uno dos cuatro");
    }

    #[test]
    fn refining_the_output_is_idempotent() {
        let boxes = vec![
            word("¿Qué", 30, 40, 40, 18),
            word("pasó?", 74, 42, 44, 18),
            word("Nada", 36, 64, 40, 18),
            word("Vamos", 220, 30, 60, 20),
            word("ya", 230, 90, 20, 20),
        ];
        let refiner = refiner(10);
        let first = refiner.refine(&boxes, 320, 200);
        let again = refiner.refine(
            &first.iter().map(RefinedRegion::as_text_box).collect::<Vec<_>>(),
            320,
            200,
        );
        assert_eq!(summary(&again), summary(&first));
    }

    #[test]
    fn cluster_distance_joins_nearby_columns() {
        let boxes = vec![word("arriba", 50, 10, 40, 20), word("abajo", 50, 60, 40, 20)];
        let plain = refiner(5).refine(&boxes, 200, 200);
        assert_eq!(plain.len(), 2);

        let clustered = Refiner::new(&RefineSettings {
            padding: 5,
            cluster_distance: Some(80.0),
            ..RefineSettings::default()
        })
        .refine(&boxes, 200, 200);
        assert_eq!(clustered.len(), 1);
        assert_eq!(clustered[0].text, "arriba abajo");
    }

    #[test]
    fn max_regions_keeps_the_largest() {
        let boxes = vec![
            word("chico", 10, 10, 10, 10),
            word("grande", 100, 100, 80, 40),
            word("medio", 10, 200, 40, 20),
        ];
        let regions = Refiner::new(&RefineSettings {
            padding: 0,
            max_regions: Some(2),
            ..RefineSettings::default()
        })
        .refine(&boxes, 300, 300);
        let texts = regions.iter().map(|r| r.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["grande", "medio"]);
        assert_eq!(regions[1].index, 2);
    }

    #[test]
    fn empty_input_gives_no_regions() {
        assert!(refiner(10).refine(&[], 100, 100).is_empty());
    }

    #[test]
    fn reading_order_follows_lines() {
        let ordered = reading_order(vec![
            word("tres", 10, 40, 30, 15),
            word("dos", 50, 12, 30, 15),
            word("uno", 10, 10, 30, 15),
        ]);
        let texts = ordered.iter().map(|w| w.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["uno", "dos", "tres"]);
    }
}
