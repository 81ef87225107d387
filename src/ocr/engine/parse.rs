use std::collections::BTreeMap;

use crate::ocr::OcrLine;
use crate::ocr::geom::rect_polygon;

#[derive(Debug, Clone, Copy)]
struct BBoxPx {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl BBoxPx {
    fn union(&self, other: &BBoxPx) -> BBoxPx {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = (self.x + self.w).max(other.x + other.w);
        let y2 = (self.y + self.h).max(other.y + other.h);
        BBoxPx {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        }
    }
}

#[derive(Clone)]
struct WordToken {
    text: String,
    bbox: BBoxPx,
}

/// Groups tesseract TSV word rows into lines, ordered top to bottom and
/// then left to right.
pub(super) fn parse_tsv_lines(tsv: &str) -> Vec<OcrLine> {
    let mut word_map: BTreeMap<(i32, i32, i32, i32), Vec<WordToken>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let page_num: i32 = cols[1].parse().unwrap_or(0);
        let block_num: i32 = cols[2].parse().unwrap_or(0);
        let par_num: i32 = cols[3].parse().unwrap_or(0);
        let line_num: i32 = cols[4].parse().unwrap_or(0);
        let left: u32 = cols[6].parse().unwrap_or(0);
        let top: u32 = cols[7].parse().unwrap_or(0);
        let width: u32 = cols[8].parse().unwrap_or(0);
        let height: u32 = cols[9].parse().unwrap_or(0);
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (page_num, block_num, par_num, line_num);
        word_map.entry(key).or_default().push(WordToken {
            text: text.to_string(),
            bbox: BBoxPx {
                x: left,
                y: top,
                w: width,
                h: height,
            },
        });
    }

    let mut lines = word_map
        .into_values()
        .filter_map(|mut words| {
            words.sort_by_key(|word| word.bbox.x);
            build_line(&words)
        })
        .collect::<Vec<_>>();
    lines.sort_by_key(|(bbox, _)| (bbox.y, bbox.x));
    lines.into_iter().map(|(_, line)| line).collect()
}

fn build_line(words: &[WordToken]) -> Option<(BBoxPx, OcrLine)> {
    let first = words.first()?;
    let text = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let bbox = words
        .iter()
        .skip(1)
        .fold(first.bbox, |acc, word| acc.union(&word.bbox));
    let polygon = rect_polygon(bbox.x as f32, bbox.y as f32, bbox.w as f32, bbox.h as f32);
    Some((bbox, OcrLine::new(text, polygon)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/tesseract_cover.tsv"
    ));

    #[test]
    fn groups_words_into_reading_order_lines() {
        let lines = parse_tsv_lines(TSV);
        let texts = lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["MISTBORN", "THE FINAL EMPIRE", "Brandon Sanderson"]
        );
    }

    #[test]
    fn line_polygon_is_union_of_word_boxes() {
        let lines = parse_tsv_lines(TSV);
        let subtitle = &lines[1];
        assert_eq!(
            subtitle.polygon,
            vec![120.0, 330.0, 520.0, 330.0, 520.0, 372.0, 120.0, 372.0]
        );
        assert_eq!(subtitle.text_size(), 42.0);
        assert_eq!(lines[0].text_size(), 140.0);
    }

    #[test]
    fn skips_rows_without_confidence_or_text() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t-1\tghost\n\
                   5\t1\t1\t1\t1\t2\t0\t0\t10\t10\t90\t \n\
                   4\t1\t1\t1\t1\t0\t0\t0\t10\t10\t-1\t\n";
        assert!(parse_tsv_lines(tsv).is_empty());
    }
}
