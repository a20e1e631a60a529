//! Block factory: fully-defaulted blocks from a kind tag.

use hyprdoc_types::{
    Block, BlockBody, BlockFields, BlockId, BlockKind, Condition, CurrencySettings, PaymentSettings,
};

/// Build a new block of `kind` with a fresh id, the kind's default label, and
/// an empty payload.
///
/// A `columns` block comes pre-filled with two 50/50 columns so it renders as
/// a usable row immediately.
pub fn new_block(kind: BlockKind) -> Block {
    let body = match kind {
        BlockKind::Text => BlockBody::Text { content: String::new() },
        BlockKind::Input => BlockBody::Input { variable_name: String::new() },
        BlockKind::LongText => BlockBody::LongText { variable_name: String::new() },
        BlockKind::Number => BlockBody::Number { variable_name: String::new() },
        BlockKind::Email => BlockBody::Email { variable_name: String::new() },
        BlockKind::Date => BlockBody::Date { variable_name: String::new() },
        BlockKind::Select => BlockBody::Select {
            variable_name: String::new(),
            options: default_options(),
        },
        BlockKind::Radio => BlockBody::Radio {
            variable_name: String::new(),
            options: default_options(),
        },
        BlockKind::Checkbox => BlockBody::Checkbox {
            variable_name: String::new(),
            options: default_options(),
        },
        BlockKind::Signature => BlockBody::Signature {
            content: String::new(),
            signature_id: None,
            signed_at: None,
        },
        BlockKind::Image => BlockBody::Image { content: String::new() },
        BlockKind::Video => BlockBody::Video { content: String::new() },
        BlockKind::Html => BlockBody::Html { content: String::new() },
        BlockKind::FileUpload => BlockBody::FileUpload {
            variable_name: String::new(),
            content: String::new(),
        },
        BlockKind::SectionBreak => BlockBody::SectionBreak {},
        BlockKind::Formula => BlockBody::Formula {
            variable_name: String::new(),
            formula: String::new(),
        },
        BlockKind::Payment => BlockBody::Payment {
            payment_settings: PaymentSettings::default(),
        },
        BlockKind::Currency => BlockBody::Currency {
            variable_name: String::new(),
            currency_settings: CurrencySettings::default(),
        },
        BlockKind::Conditional => BlockBody::Conditional {
            condition: Condition::default(),
            children: Vec::new(),
            else_children: Vec::new(),
        },
        BlockKind::Repeater => BlockBody::Repeater {
            variable_name: String::new(),
            children: Vec::new(),
        },
        BlockKind::Columns => BlockBody::Columns {
            children: vec![new_column(50.0, Vec::new()), new_column(50.0, Vec::new())],
        },
        BlockKind::Column => BlockBody::Column {
            width: 50.0,
            children: Vec::new(),
        },
    };

    Block {
        id: BlockId::new(),
        fields: BlockFields {
            label: kind.default_label().to_string(),
            ..BlockFields::default()
        },
        body,
    }
}

/// Build a column of the given width holding `children`.
pub fn new_column(width: f64, children: Vec<Block>) -> Block {
    Block {
        id: BlockId::new(),
        fields: BlockFields {
            label: BlockKind::Column.default_label().to_string(),
            ..BlockFields::default()
        },
        body: BlockBody::Column { width, children },
    }
}

/// Build an empty `columns` wrapper around already-built columns.
pub fn new_row(columns: Vec<Block>) -> Block {
    Block {
        id: BlockId::new(),
        fields: BlockFields {
            label: BlockKind::Columns.default_label().to_string(),
            ..BlockFields::default()
        },
        body: BlockBody::Columns { children: columns },
    }
}

fn default_options() -> Vec<String> {
    vec!["Option 1".to_string()]
}

/// Deep-copy a block, giving it and every descendant a fresh id.
pub fn reissue_ids(block: Block) -> Block {
    Block {
        id: BlockId::new(),
        fields: block.fields,
        body: block
            .body
            .map_children(|_, kids| kids.into_iter().map(reissue_ids).collect()),
    }
}
