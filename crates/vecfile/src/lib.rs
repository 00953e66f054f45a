//! Line-oriented plumbing for vector files: the streaming [`FileReader`],
//! the quote-aware [`LineTokenizer`] and the scalar parsers. Everything
//! above this crate works in tokens, not raw bytes.

mod parse;
mod reader;
mod tokenizer;

pub use parse::{parse_double, parse_int, parse_int64, parse_simtime};
pub use reader::{FileReader, LineView, ReaderConfig};
pub use tokenizer::{LineTokenizer, TokenizerConfig, quote_if_needed};
