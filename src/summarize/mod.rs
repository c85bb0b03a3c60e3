//! Budgeted digest of a page.
//!
//! A page is cut into articles at its top-level headings (and at callouts once
//! the first heading has been seen). Each article is trimmed against its own
//! [`Budget`]: images beyond the allowance are dropped, text is kept, conceded
//! or truncated mid-block, and layout containers are hoisted away. The
//! surviving blocks are flattened and reordered so the heading and the lead
//! visual come first.
//!
//! Links to the full article are not known yet at this point.
//! [`ARTICLE_SLUG_PLACEHOLDER`] and [`READ_MORE_MARKER`] are left in the
//! blocks and substituted once the digest is rendered.

use crate::config::SummaryBudget;
use crate::model::{
    Block, BlockKind, BlockTag, Flow, Media, Page, RichText, Thumbnail, Visit, plain_text,
    walk_mut,
};
use crate::render::text::youtube_id;

#[cfg(test)]
mod tests;

/// Stands in for the permalink of the article a block belongs to
pub const ARTICLE_SLUG_PLACEHOLDER: &str = "--ARTICLE--SLUG--";

/// Marks where a truncated text block was cut
pub const READ_MORE_MARKER: &str = "--READ-MORE--";

/// One trimmed section of a digest
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Whether content was left out, so a link to the full text is due
    pub truncated: bool,
    pub blocks: Vec<Block>,
}

/// Allowances left to an article. Negative values record trimming owed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub images: i64,
    pub words: i64,
}

impl Budget {
    /// Starting allowance of the article at `index`; the lead article gets
    /// the word multiplier
    pub fn for_article(index: usize, limits: &SummaryBudget) -> Self {
        let multiplier = if index == 0 { limits.lead_multiplier } else { 1 };
        Self {
            images: limits.images_per_article,
            words: limits.words_per_article * multiplier,
        }
    }

    pub fn overrun(&self) -> bool {
        self.images < 0 || self.words < 0
    }
}

/// Split `page` into budget-trimmed articles
pub fn summarize(page: &Page, limits: &SummaryBudget) -> Vec<Article> {
    let title = page.title_text();
    segment(&page.blocks)
        .into_iter()
        .enumerate()
        .map(|(index, mut blocks)| {
            let mut budget = Budget::for_article(index, limits);
            let heading = blocks.first().map(Block::plain_text).unwrap_or_default();
            ::log::debug!("SUMMARIZE {} / {}", title, heading);

            walk_mut(&mut blocks, None, &mut |block: &mut Block, _: &Visit<'_>| {
                trim_block(block, &mut budget, limits)
            });

            let mut flat = Vec::new();
            flatten(blocks, &mut flat);
            flat.sort_by_key(|b| priority(b.tag()));

            ::log::info!(
                "SUMMARIZED {} / {}: {:?} {:?}",
                title,
                heading,
                budget,
                flat.iter().map(Block::tag).collect::<Vec<_>>()
            );
            Article {
                truncated: budget.overrun(),
                blocks: flat,
            }
        })
        .collect()
}

/// Cut top-level blocks into article segments. Blocks before the first
/// heading form the lead; the opening heading of every other article links to
/// the article placeholder.
pub fn segment(blocks: &[Block]) -> Vec<Vec<Block>> {
    let mut lead = Vec::new();
    let mut articles: Vec<Vec<Block>> = Vec::new();

    for block in blocks {
        let opens = match block.tag() {
            BlockTag::Heading1 => true,
            BlockTag::Callout => !articles.is_empty(),
            _ => false,
        };
        let mut block = block.clone();
        if opens {
            if let BlockKind::Heading1 { heading_1 } = &mut block.kind {
                heading_1.link = Some(ARTICLE_SLUG_PLACEHOLDER.to_string());
            }
            articles.push(vec![block]);
        } else {
            match articles.last_mut() {
                Some(article) => article.push(block),
                None => lead.push(block),
            }
        }
    }

    if !lead.is_empty() {
        articles.insert(0, lead);
    }
    articles
}

/// Apply the budget to one block, rewriting its kind when it is dropped,
/// hoisted or replaced by a thumbnail
fn trim_block(block: &mut Block, budget: &mut Budget, limits: &SummaryBudget) -> Flow {
    match &mut block.kind {
        BlockKind::Image { image } => {
            image.link = Some(ARTICLE_SLUG_PLACEHOLDER.to_string());
            let exhausted = budget.images <= 0;
            budget.images -= 1;
            if exhausted {
                ::log::debug!("TRIM DROP image {}", block.id);
                block.kind = BlockKind::SummaryDrop;
                return Flow::SkipChildren;
            }
        }
        BlockKind::Video { video } if budget.images > 0 => {
            if let Some(summary_thumbnail) = thumbnail(video) {
                ::log::debug!("TRIM THUMB {}", summary_thumbnail.src);
                block.kind = BlockKind::SummaryThumbnail { summary_thumbnail };
                budget.images -= 1;
            }
        }
        BlockKind::Paragraph { .. }
        | BlockKind::BulletedListItem { .. }
        | BlockKind::NumberedListItem { .. } => {
            trim_text(block, budget, limits);
            return Flow::SkipChildren;
        }
        BlockKind::Callout { .. } => {
            let navigation = block
                .children()
                .first()
                .is_some_and(|c| c.tag() == BlockTag::TableOfContents);
            if navigation {
                ::log::debug!("TRIM DROP table of contents {}", block.id);
                block.kind = BlockKind::SummaryDrop;
                return Flow::SkipChildren;
            }
            budget.words += limits.callout_words;
            budget.images += limits.callout_images;
        }
        BlockKind::Column | BlockKind::ColumnList => block.kind = BlockKind::SummaryHoist,
        _ => {}
    }
    Flow::Continue
}

fn trim_text(block: &mut Block, budget: &mut Budget, limits: &SummaryBudget) {
    let count = block.rich_text().map(word_count).unwrap_or(0);
    if budget.words <= 0 {
        ::log::debug!("TRIM DROP {:?} {}", block.tag(), block.id);
        block.kind = BlockKind::SummaryDrop;
        budget.words -= count;
    } else if budget.words >= count {
        ::log::debug!("TRIM KEEP {:?} {}", block.tag(), block.id);
        budget.words -= count;
    } else if count - budget.words < limits.excess_tolerance {
        ::log::debug!("TRIM CONC {:?} {}", block.tag(), block.id);
        budget.words = 0;
    } else {
        ::log::debug!("TRIM HALF {:?} {} to {}", block.tag(), block.id, budget.words);
        if let Some(runs) = block.rich_text_mut() {
            truncate_runs(runs, budget.words);
        }
        budget.words -= count;
    }
}

/// Words of a rich-text field, not counting a read-more marker. Runs are
/// joined first so a word split over styled runs counts once.
pub fn word_count(runs: &[RichText]) -> i64 {
    run_words(&plain_text(runs)).len() as i64
}

fn run_words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|w| *w != READ_MORE_MARKER)
        .collect()
}

/// Remove words from the end of `runs` until at most `limit` remain. A run
/// with no more words than the excess goes entirely; a longer one is cut and
/// ends with an ellipsis and the read-more marker.
pub fn truncate_runs(runs: &mut Vec<RichText>, limit: i64) {
    loop {
        let count = word_count(runs);
        if count <= limit {
            break;
        }
        let excess = (count - limit) as usize;
        let Some(tail) = runs.last_mut() else {
            break;
        };
        let words = run_words(&tail.plain_text);
        if words.len() <= excess {
            runs.pop();
            continue;
        }
        let cut = format!(
            "{}... {}",
            words[..words.len() - excess].join(" "),
            READ_MORE_MARKER
        );
        if let Some(text) = &mut tail.text {
            text.content = cut.clone();
        }
        tail.plain_text = cut;
    }
}

/// Static preview of an externally hosted YouTube video
fn thumbnail(video: &Media) -> Option<Thumbnail> {
    if !video.source.is_external() {
        return None;
    }
    youtube_id(video.source.url()).map(|id| Thumbnail {
        link: ARTICLE_SLUG_PLACEHOLDER.to_string(),
        src: format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id),
    })
}

/// Splice hoisted containers into one sequence, leaving dropped blocks out
fn flatten(blocks: Vec<Block>, out: &mut Vec<Block>) {
    for block in blocks {
        match block.tag() {
            BlockTag::SummaryHoist => flatten(block.children.unwrap_or_default(), out),
            BlockTag::SummaryDrop => {}
            _ => out.push(block),
        }
    }
}

fn priority(tag: BlockTag) -> u8 {
    match tag {
        BlockTag::Heading1 => 1,
        BlockTag::Image | BlockTag::SummaryThumbnail => 2,
        _ => 100,
    }
}
