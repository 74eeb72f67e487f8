mod byte_level;

pub use byte_level::{ByteTokenizer, TokenizeStats, VOCAB_SIZE};
