// Structural properties of chunking, resolution and rendering over generated inputs
// WHY: seeded generator keeps failures reproducible without extra test dependencies

use spanmask::render::{render, RenderStrategy};
use spanmask::span::char_len;
use spanmask::{chunk_text, mask_text, resolve, MaskStyle, TextSpan};

/// Small xorshift generator, deterministic per seed
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound.max(1) as u64) as usize
    }
}

const ALPHABET: &[char] = &['a', 'b', ' ', '.', 'Ж', 'ё', '🦀', '<', '&', '\n'];

fn random_text(rng: &mut Rng, max_len: usize) -> String {
    let len = rng.below(max_len + 1);
    (0..len).map(|_| ALPHABET[rng.below(ALPHABET.len())]).collect()
}

fn random_spans(rng: &mut Rng, text_len: usize, count: usize) -> Vec<TextSpan> {
    (0..count)
        .map(|_| {
            let start = rng.below(text_len + 3);
            let end = start + rng.below(6);
            TextSpan::new("PERSON", "", start, end)
        })
        .collect()
}

/// Records which source offsets each literal run and span consumed
struct CoverageStrategy;

impl RenderStrategy for CoverageStrategy {
    fn write_literal(&self, run: &str, out: &mut String) {
        out.extend(run.chars().map(|_| 'L'));
    }

    fn write_span(&self, _span: &TextSpan, source: &str, out: &mut String) {
        out.extend(source.chars().map(|_| 'S'));
    }
}

#[test]
fn test_chunks_always_reconstruct_text() {
    let mut rng = Rng(0x5eed_1234);
    for _ in 0..300 {
        let text = random_text(&mut rng, 60);
        let size = 1 + rng.below(15) as i64;
        let chunks = chunk_text(&text, size).unwrap();

        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rebuilt, text);

        let mut expected_offset = 0;
        for chunk in &chunks {
            assert_eq!(chunk.global_offset, expected_offset);
            assert!(chunk.char_len as i64 <= size);
            assert!(chunk.char_len > 0);
            expected_offset += chunk.char_len;
        }
        assert_eq!(expected_offset, char_len(&text));
    }
}

#[test]
fn test_resolved_spans_are_ordered_disjoint_and_bounded() {
    let mut rng = Rng(0xdead_beef);
    for _ in 0..300 {
        let text = random_text(&mut rng, 40);
        let len = char_len(&text);
        let count = rng.below(12);
        let resolved = resolve(random_spans(&mut rng, len, count), len);

        for span in resolved.iter() {
            assert!(span.start <= span.end);
            assert!(span.end <= len);
        }
        for pair in resolved.as_slice().windows(2) {
            assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
            assert!(pair[0].start <= pair[1].start);
        }
    }
}

#[test]
fn test_render_covers_every_offset_exactly_once() {
    let mut rng = Rng(0x0bad_cafe);
    for _ in 0..300 {
        let text = random_text(&mut rng, 40);
        let len = char_len(&text);
        let count = rng.below(10);
        let resolved = resolve(random_spans(&mut rng, len, count), len);

        let coverage = render(&text, &resolved, &CoverageStrategy);
        assert_eq!(coverage.chars().count(), len);

        let covered_by_spans: usize = resolved.iter().map(|s| s.len()).sum();
        assert_eq!(coverage.chars().filter(|&c| c == 'S').count(), covered_by_spans);
    }
}

#[test]
fn test_asterisk_masking_preserves_unmasked_text() {
    let mut rng = Rng(0x1357_9bdf);
    for _ in 0..200 {
        let text = random_text(&mut rng, 40);
        let len = char_len(&text);
        let count = rng.below(6);
        let resolved = resolve(random_spans(&mut rng, len, count), len);

        let masked = mask_text(&text, &resolved, MaskStyle::Asterisks);
        let masked_chars = masked.chars().count();
        assert_eq!(masked_chars, len, "asterisk masking keeps length when span text is empty");

        // Every character outside a span survives at its original position
        let original: Vec<char> = text.chars().collect();
        let rendered: Vec<char> = masked.chars().collect();
        for (i, ch) in original.iter().enumerate() {
            if !resolved.iter().any(|s| s.start <= i && i < s.end) {
                assert_eq!(rendered[i], *ch);
            } else {
                assert_eq!(rendered[i], '*');
            }
        }
    }
}
