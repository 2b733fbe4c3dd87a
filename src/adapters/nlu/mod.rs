//! Intent recognizers.

mod keyword;

pub use keyword::KeywordRecognizer;
