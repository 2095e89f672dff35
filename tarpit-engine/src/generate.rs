//! Deterministic fake-page generation: given `SYSTEM_SEED` and a request
//! path, produces byte-identical HTML across restarts by seeding a local
//! PRNG from `digest(seed || path)` and drawing every random choice from
//! it in a fixed order.

use defense_common::config::TarpitSettings;
use defense_common::markov::{MarkovModel, EMPTY_TOKEN_ID};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

struct PageStructure {
    title: String,
    heading: String,
    paragraph_token_counts: Vec<u32>,
    links: Vec<(String, String)>,
}

/// `h = digest(seed || p)`, reduced to a 64-bit PRNG seed.
pub fn seed_for_path(system_seed: &str, path: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(system_seed.as_bytes());
    hasher.update(path.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[0..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

fn build_structure(rng: &mut StdRng, config: &TarpitSettings, path: &str) -> PageStructure {
    let num_paragraphs = rng.gen_range(config.min_paragraphs..=config.max_paragraphs);
    let paragraph_token_counts = (0..num_paragraphs)
        .map(|_| rng.gen_range(config.min_paragraph_tokens..=config.max_paragraph_tokens))
        .collect();

    let title_number: u32 = rng.gen_range(1000..9999);
    let title = format!("Article {title_number}");

    let num_links = rng.gen_range(3..=8);
    let trimmed_path = path.trim_end_matches('/');
    let links = (0..num_links)
        .map(|_| {
            let slug: String = (0..8)
                .map(|_| (b'a' + rng.gen_range(0..26u8)) as char)
                .collect();
            let href = format!("{trimmed_path}/{slug}");
            let anchor = format!("Related: {slug}");
            (href, anchor)
        })
        .collect();

    PageStructure {
        heading: title.clone(),
        title,
        paragraph_token_counts,
        links,
    }
}

/// Generate one paragraph of Markov-sampled text of approximately
/// `token_count` words, restarting from `(∅, ∅)` whenever the chain dead-ends.
fn generate_paragraph(model: &MarkovModel, rng: &mut impl Rng, token_count: u32) -> String {
    if model.is_empty() {
        return String::new();
    }

    let mut tokens: Vec<String> = Vec::with_capacity(token_count as usize);
    let mut p1 = EMPTY_TOKEN_ID;
    let mut p2 = EMPTY_TOKEN_ID;
    let mut capitalize_next = true;
    let mut restarts_without_progress = 0u32;

    while tokens.len() < token_count as usize {
        match model.sample_successor(p1, p2, rng) {
            Some(next_id) => {
                restarts_without_progress = 0;
                if let Some(word) = model.word_text(next_id) {
                    let mut word = word.to_string();
                    if capitalize_next {
                        word = capitalize_first(&word);
                    }
                    capitalize_next = word.ends_with(['.', '!', '?']);
                    p1 = p2;
                    p2 = next_id;
                    tokens.push(word);
                } else {
                    p1 = EMPTY_TOKEN_ID;
                    p2 = EMPTY_TOKEN_ID;
                }
            }
            None => {
                p1 = EMPTY_TOKEN_ID;
                p2 = EMPTY_TOKEN_ID;
                restarts_without_progress += 1;
                if restarts_without_progress > 3 {
                    break;
                }
            }
        }
    }

    tokens.join(" ")
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the full fake page as a sequence of HTML chunks ready to be
/// streamed with an inter-chunk delay. Deterministic: identical
/// `(system_seed, path)` always yields the identical chunk sequence.
pub fn render_chunks(model: &MarkovModel, config: &TarpitSettings, path: &str) -> Vec<String> {
    let seed = seed_for_path(&config.system_seed, path);
    let mut rng = StdRng::seed_from_u64(seed);
    let structure = build_structure(&mut rng, config, path);

    let mut chunks = Vec::new();
    chunks.push(format!(
        "<!DOCTYPE html><html><head><title>{}</title></head><body><h1>{}</h1>",
        escape_html(&structure.title),
        escape_html(&structure.heading),
    ));

    for count in &structure.paragraph_token_counts {
        let paragraph = generate_paragraph(model, &mut rng, *count);
        chunks.push(format!("<p>{}</p>", escape_html(&paragraph)));
    }

    chunks.push("<ul>".to_string());
    for (href, anchor) in &structure.links {
        chunks.push(format!(
            "<li><a href=\"{}\">{}</a></li>",
            escape_html(href),
            escape_html(anchor),
        ));
    }
    chunks.push("</ul></body></html>".to_string());

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_model() -> MarkovModel {
        let words: HashMap<i64, String> = [
            (1, "".to_string()),
            (2, "the".to_string()),
            (3, "quick".to_string()),
            (4, "fox".to_string()),
            (5, "jumps.".to_string()),
        ]
        .into_iter()
        .collect();
        let mut successors: HashMap<(i64, i64), Vec<(i64, i64)>> = HashMap::new();
        successors.insert((1, 1), vec![(2, 1)]);
        successors.insert((1, 2), vec![(3, 1)]);
        successors.insert((2, 3), vec![(4, 1)]);
        successors.insert((3, 4), vec![(5, 1)]);
        successors.insert((4, 5), vec![(2, 1)]);

        MarkovModel::from_parts(successors, words)
    }

    fn sample_config() -> TarpitSettings {
        let mut cfg = TarpitSettings::default();
        cfg.system_seed = "test-seed".to_string();
        cfg.min_paragraphs = 2;
        cfg.max_paragraphs = 2;
        cfg.min_paragraph_tokens = 4;
        cfg.max_paragraph_tokens = 4;
        cfg
    }

    #[test]
    fn test_seed_for_path_is_deterministic() {
        let a = seed_for_path("seed", "/x");
        let b = seed_for_path("seed", "/x");
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_for_path_differs_by_path() {
        let a = seed_for_path("seed", "/x");
        let b = seed_for_path("seed", "/y");
        assert_ne!(a, b);
    }

    #[test]
    fn test_render_chunks_deterministic_for_same_path() {
        let model = sample_model();
        let config = sample_config();
        let first = render_chunks(&model, &config, "/article/42");
        let second = render_chunks(&model, &config, "/article/42");
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_chunks_differ_for_different_paths() {
        let model = sample_model();
        let config = sample_config();
        let first = render_chunks(&model, &config, "/article/42");
        let second = render_chunks(&model, &config, "/article/43");
        assert_ne!(first, second);
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("fox"), "Fox");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a>&\"b\"</a>"), "&lt;a&gt;&amp;&quot;b&quot;&lt;/a&gt;");
    }
}
