use super::{Block, BlockTag};

/// Where the visitor currently stands in the tree
#[derive(Debug)]
pub struct Visit<'p> {
    pub depth: usize,
    /// Ids of the enclosing blocks, outermost first
    pub ancestors: &'p [String],
}

/// Whether a traversal descends into the children of the visited block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    SkipChildren,
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::Continue
    }
}

// Shared and mutable traversals come from the same body so the two can never
// disagree on visiting order or filtering.
macro_rules! traversal {
    ($(#[$doc:meta])* $name:ident, $level:ident $(, $m:ident)?) => {
        $(#[$doc])*
        pub fn $name<F, R>(blocks: &$($m)? [Block], kinds: Option<&[BlockTag]>, visit: &mut F)
        where
            F: FnMut(&$($m)? Block, &Visit<'_>) -> R,
            R: Into<Flow>,
        {
            let mut ancestors = Vec::new();
            $level(blocks, kinds, visit, &mut ancestors);
        }

        fn $level<F, R>(
            blocks: &$($m)? [Block],
            kinds: Option<&[BlockTag]>,
            visit: &mut F,
            ancestors: &mut Vec<String>,
        ) where
            F: FnMut(&$($m)? Block, &Visit<'_>) -> R,
            R: Into<Flow>,
        {
            for block in blocks {
                let mut flow = Flow::Continue;
                if kinds.is_none_or(|k| k.contains(&block.tag())) {
                    let at = Visit {
                        depth: ancestors.len(),
                        ancestors: ancestors.as_slice(),
                    };
                    flow = visit(&$($m)? *block, &at).into();
                }
                if flow == Flow::SkipChildren {
                    continue;
                }
                let id = block.id.clone();
                if let Some(children) = &$($m)? block.children {
                    ancestors.push(id);
                    $level(children, kinds, visit, ancestors);
                    ancestors.pop();
                }
            }
        }
    };
}

traversal!(
    /// Depth-first, pre-order walk over `blocks`, calling `visit` on every
    /// block whose kind is in `kinds` (or on all of them when `kinds` is
    /// `None`). Only present children are descended into.
    walk,
    walk_level
);

traversal!(
    /// Same as [`walk`] but hands out mutable blocks so the visitor can
    /// rewrite kinds and payloads in place.
    walk_mut,
    walk_mut_level,
    mut
);

/// Build a rewritten copy of `blocks`, leaving the input untouched
pub fn rewrite<F, R>(blocks: &[Block], kinds: Option<&[BlockTag]>, visit: &mut F) -> Vec<Block>
where
    F: FnMut(&mut Block, &Visit<'_>) -> R,
    R: Into<Flow>,
{
    let mut copy = blocks.to_vec();
    walk_mut(&mut copy, kinds, visit);
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockKind;

    fn sample() -> Vec<Block> {
        vec![
            Block::new("h1", BlockKind::heading("Intro")),
            Block::new("cl", BlockKind::ColumnList).with_children(vec![
                Block::new("c1", BlockKind::Column)
                    .with_children(vec![Block::new("i1", BlockKind::image("https://x/a.png"))]),
                Block::new("c2", BlockKind::Column)
                    .with_children(vec![Block::new("p1", BlockKind::paragraph("text"))]),
            ]),
            Block::new("p2", BlockKind::paragraph("tail")),
        ]
    }

    #[test]
    fn test_walk_visits_pre_order_with_ancestors() {
        let blocks = sample();
        let mut seen = Vec::new();
        walk(&blocks, None, &mut |b: &Block, at: &Visit<'_>| {
            seen.push((b.id.clone(), at.depth, at.ancestors.join("/")));
        });
        let ids: Vec<_> = seen.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "cl", "c1", "i1", "c2", "p1", "p2"]);
        assert_eq!(seen[3], ("i1".to_string(), 2, "cl/c1".to_string()));
    }

    #[test]
    fn test_walk_filters_by_kind_but_still_descends() {
        let blocks = sample();
        let mut ids = Vec::new();
        walk(
            &blocks,
            Some(&[BlockTag::Paragraph, BlockTag::Image]),
            &mut |b: &Block, _: &Visit<'_>| ids.push(b.id.clone()),
        );
        assert_eq!(ids, vec!["i1", "p1", "p2"]);
    }

    #[test]
    fn test_skip_children() {
        let blocks = sample();
        let mut ids = Vec::new();
        walk(&blocks, None, &mut |b: &Block, _: &Visit<'_>| {
            ids.push(b.id.clone());
            if b.tag() == BlockTag::ColumnList {
                Flow::SkipChildren
            } else {
                Flow::Continue
            }
        });
        assert_eq!(ids, vec!["h1", "cl", "p2"]);
    }

    #[test]
    fn test_rewrite_leaves_source_untouched() {
        let blocks = sample();
        let rewritten = rewrite(
            &blocks,
            Some(&[BlockTag::Column, BlockTag::ColumnList]),
            &mut |b: &mut Block, _: &Visit<'_>| b.kind = BlockKind::SummaryHoist,
        );
        assert_eq!(blocks[1].tag(), BlockTag::ColumnList);
        assert_eq!(rewritten[1].tag(), BlockTag::SummaryHoist);
        assert_eq!(rewritten[1].children()[0].tag(), BlockTag::SummaryHoist);
        assert_eq!(rewritten[1].children()[0].children()[0].id, "i1");
    }
}
