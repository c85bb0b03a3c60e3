
use crate::config::SummaryBudget;
use crate::model::{
    Block, BlockKind, BlockTag, Page, PageInfo, PageProperties, RichText, TitleProperty,
};
use chrono::{TimeZone, Utc};

/// Page titled "Digest" holding `blocks`
pub(super) fn page(blocks: Vec<Block>) -> Page {
    Page {
        info: PageInfo {
            id: "digest".to_string(),
            last_edited_time: Utc.with_ymd_and_hms(2024, 6, 3, 7, 30, 0).unwrap(),
            icon: None,
            cover: None,
            properties: PageProperties {
                title: TitleProperty {
                    title: vec![RichText::plain("Digest")],
                },
            },
        },
        blocks,
        parent: None,
    }
}

/// Budget without lead multiplier or excess tolerance
pub(super) fn limits(words: i64, images: i64) -> SummaryBudget {
    SummaryBudget {
        images_per_article: images,
        words_per_article: words,
        lead_multiplier: 1,
        excess_tolerance: 0,
        ..SummaryBudget::default()
    }
}

pub(super) fn tags(blocks: &[Block]) -> Vec<BlockTag> {
    blocks.iter().map(Block::tag).collect()
}

pub(super) fn para(id: &str, text: &str) -> Block {
    Block::new(id, BlockKind::paragraph(text))
}
